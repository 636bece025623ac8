// src/city.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// The monitored cities. Anything else is a deployment error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum City {
    Calgary,
    Edmonton,
}

impl City {
    pub const ALL: [City; 2] = [City::Calgary, City::Edmonton];

    pub fn as_str(self) -> &'static str {
        match self {
            City::Calgary => "Calgary",
            City::Edmonton => "Edmonton",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            City::Calgary => "calgary",
            City::Edmonton => "edmonton",
        }
    }

    /// CSS selector of the city's container on the wait-times page.
    pub fn section_selector(self) -> String {
        format!("div.cityContent-{}", self.slug())
    }

    /// Mongo collection holding this city's observations.
    pub fn collection(self) -> &'static str {
        self.as_str()
    }

    pub fn csv_file_name(self) -> String {
        format!("{}_hospital_stats.csv", self.as_str())
    }

    /// Calgary waits out the stagger so both browser sessions don't launch together.
    pub fn is_second_mover(self) -> bool {
        matches!(self, City::Calgary)
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for City {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "calgary" => Ok(City::Calgary),
            "edmonton" => Ok(City::Edmonton),
            _ => Err(ConfigError::UnsupportedCity(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("CALGARY".parse::<City>().unwrap(), City::Calgary);
        assert_eq!(" edmonton ".parse::<City>().unwrap(), City::Edmonton);
    }

    #[test]
    fn unknown_city_is_config_error() {
        let err = "Red Deer".parse::<City>().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedCity(ref c) if c == "Red Deer"));
    }

    #[test]
    fn derived_names() {
        assert_eq!(City::Edmonton.section_selector(), "div.cityContent-edmonton");
        assert_eq!(City::Calgary.csv_file_name(), "Calgary_hospital_stats.csv");
        assert!(City::Calgary.is_second_mover());
        assert!(!City::Edmonton.is_second_mover());
    }
}
