#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Price(f64);

impl Price {
    pub fn new(value: f64) -> Result<Self, String> {
        if !value.is_finite() {
            return Err("Price must be finite".to_string());
        }
        if value >= 0.0 {
            Ok(Price(value))
        } else {
            Err("Price must be non-negative".to_string())
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Absolute distance between two prices
    pub fn distance(&self, other: Price) -> f64 {
        (self.0 - other.0).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_new_valid() {
        let price = Price::new(2000.0);
        assert!(price.is_ok());
        assert_eq!(price.unwrap().value(), 2000.0);
    }

    #[test]
    fn test_price_new_negative() {
        let price = Price::new(-10.0);
        assert!(price.is_err());
        assert_eq!(price.unwrap_err(), "Price must be non-negative");
    }

    #[test]
    fn test_price_new_nan() {
        assert!(Price::new(f64::NAN).is_err());
        assert!(Price::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_price_distance() {
        let entry = Price::new(2000.0).unwrap();
        let stop = Price::new(1995.5).unwrap();
        assert_eq!(entry.distance(stop), 4.5);
        assert_eq!(stop.distance(entry), 4.5);
    }
}
