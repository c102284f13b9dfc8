// src/utils/id_generator.rs
use chrono::{DateTime, Utc};
use rand::Rng;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdType {
    Driver,
    Offer,
    Booking,
}

impl IdType {
    pub fn to_prefix(&self) -> &'static str {
        match self {
            IdType::Driver => "drv",
            IdType::Offer => "ofr",
            IdType::Booking => "bkg",
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_prefix())
    }
}

pub struct IdGenerator;

impl IdGenerator {
    /// Generate a unique ID with format: {prefix}-{date}-{random_suffix}
    pub fn generate(id_type: IdType) -> String {
        Self::generate_with_timestamp(id_type, Utc::now())
    }

    /// Generate ID with a specific timestamp (useful for testing)
    pub fn generate_with_timestamp(id_type: IdType, timestamp: DateTime<Utc>) -> String {
        let date_part = timestamp.format("%y%m%d").to_string(); // YYMMDD
        let random_suffix = Self::generate_suffix(5);

        format!("{}-{}-{}", id_type.to_prefix(), date_part, random_suffix)
    }

    fn generate_suffix(n: usize) -> String {
        const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = rand::rng();
        (0..n)
            .map(|_| {
                let idx = rng.random_range(0..CHARS.len());
                CHARS[idx] as char
            })
            .collect()
    }

    /// Parse an ID to extract its components
    pub fn parse_id(id: &str) -> Option<ParsedId> {
        let parts: Vec<&str> = id.split('-').collect();
        if parts.len() != 3 {
            return None;
        }

        let (prefix, date_part, random_suffix) = (parts[0], parts[1], parts[2]);
        if date_part.len() != 6 || random_suffix.len() != 5 {
            return None;
        }

        let id_type = match prefix {
            "drv" => IdType::Driver,
            "ofr" => IdType::Offer,
            "bkg" => IdType::Booking,
            _ => return None,
        };

        let year = format!("20{}", &date_part[0..2]).parse::<i32>().ok()?;
        let month = date_part[2..4].parse::<u32>().ok()?;
        let day = date_part[4..6].parse::<u32>().ok()?;

        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }

        Some(ParsedId {
            id_type,
            year,
            month,
            day,
            random_suffix: random_suffix.to_string(),
        })
    }

    /// Validate if an ID matches the expected format and type
    pub fn validate_id(id: &str, expected_type: Option<IdType>) -> bool {
        match Self::parse_id(id) {
            Some(parsed) => match expected_type {
                Some(expected) => parsed.id_type == expected,
                None => true,
            },
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedId {
    pub id_type: IdType,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub random_suffix: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_id_generation() {
        let offer_id = IdGenerator::generate(IdType::Offer);
        assert!(offer_id.starts_with("ofr-"));
        assert_eq!(offer_id.split('-').count(), 3);

        let driver_id = IdGenerator::generate(IdType::Driver);
        assert!(driver_id.starts_with("drv-"));
    }

    #[test]
    fn test_id_parsing() {
        let test_date = Utc.with_ymd_and_hms(2026, 8, 25, 0, 0, 0).unwrap();
        let id = IdGenerator::generate_with_timestamp(IdType::Booking, test_date);

        let parsed = IdGenerator::parse_id(&id).unwrap();
        assert_eq!(parsed.id_type, IdType::Booking);
        assert_eq!(parsed.year, 2026);
        assert_eq!(parsed.month, 8);
        assert_eq!(parsed.day, 25);
        assert_eq!(parsed.random_suffix.len(), 5);
    }

    #[test]
    fn test_validation() {
        let valid_id = "ofr-260825-a1b2c";
        assert!(IdGenerator::validate_id(valid_id, Some(IdType::Offer)));
        assert!(!IdGenerator::validate_id(valid_id, Some(IdType::Booking)));

        assert!(!IdGenerator::validate_id("invalid-format", None));
        assert!(!IdGenerator::validate_id("ofr-269999-a1b2c", None));
    }
}
