use crate::error::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

/// Nano-units per whole unit. Kubernetes quantities never carry more
/// precision than `1n`.
const NANOS_PER_UNIT: i128 = 1_000_000_000;

/// Binary suffixes, largest first
const BINARY_SUFFIXES: [(&str, u32); 6] = [
    ("Ei", 60),
    ("Pi", 50),
    ("Ti", 40),
    ("Gi", 30),
    ("Mi", 20),
    ("Ki", 10),
];

/// Decimal exponents tried when rendering, largest first
const DECIMAL_EXPONENTS: [i32; 10] = [18, 15, 12, 9, 6, 3, 0, -3, -6, -9];

/// Notation a quantity was written in; drives its canonical rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuantityFormat {
    /// Power-of-two suffixes (Ki, Mi, Gi, ...)
    BinarySI,
    /// Power-of-ten suffixes (n, u, m, k, M, G, ...) or none
    #[default]
    DecimalSI,
    /// Scientific notation (1e3, 5E-3)
    DecimalExponent,
}

/// Exact resource amount parsed from a Kubernetes quantity string.
///
/// Values are held as a signed count of nano-units so sums, differences and
/// comparisons are exact. Equality and ordering ignore the notation: `1Gi`
/// equals `1073741824`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quantity {
    nanos: i128,
    format: QuantityFormat,
}

impl Quantity {
    /// The zero quantity
    pub fn zero() -> Self {
        Self::default()
    }

    /// Parse a quantity string (e.g., "500m", "2", "1.5Gi", "1e3")
    pub fn parse(s: &str) -> Result<Self> {
        let text = s.trim();
        let (negative, unsigned) = if let Some(rest) = text.strip_prefix('-') {
            (true, rest)
        } else if let Some(rest) = text.strip_prefix('+') {
            (false, rest)
        } else {
            (false, text)
        };

        let number_end = unsigned
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(number_end);

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if fraction.contains('.') {
            return Err(CoreError::invalid_quantity(s, "more than one decimal point"));
        }
        if whole.is_empty() && fraction.is_empty() {
            return Err(CoreError::invalid_quantity(s, "missing numeric value"));
        }

        let mut mantissa: i128 = 0;
        for digit in whole.bytes().chain(fraction.bytes()) {
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(i128::from(digit - b'0')))
                .ok_or_else(|| CoreError::invalid_quantity(s, "value out of range"))?;
        }

        let (format, binary_shift, decimal_exp) = parse_suffix(s, suffix)?;
        let mantissa = mantissa
            .checked_mul(1i128 << binary_shift)
            .ok_or_else(|| CoreError::invalid_quantity(s, "value out of range"))?;

        let scale = 9 + i64::from(decimal_exp) - fraction.len() as i64;
        let magnitude = scale_by_pow10(mantissa, scale)
            .ok_or_else(|| CoreError::invalid_quantity(s, "value out of range"))?;

        Ok(Self {
            nanos: if negative { -magnitude } else { magnitude },
            format,
        })
    }

    /// Notation this quantity renders in
    pub fn format(&self) -> QuantityFormat {
        self.format
    }

    /// Raw value in nano-units
    pub fn as_nanos(&self) -> i128 {
        self.nanos
    }

    pub fn is_zero(&self) -> bool {
        self.nanos == 0
    }

    pub fn is_negative(&self) -> bool {
        self.nanos < 0
    }

    /// Render in the shortest exact form for this quantity's notation.
    ///
    /// Mirrors the apiserver's canonical form: `1024Mi` renders as `1Gi`,
    /// `1000m` as `1`, `1500m` stays `1500m`.
    pub fn canonical(&self) -> String {
        if self.nanos == 0 {
            return "0".to_string();
        }

        if self.format == QuantityFormat::BinarySI && self.nanos % NANOS_PER_UNIT == 0 {
            let units = self.nanos / NANOS_PER_UNIT;
            for (suffix, shift) in BINARY_SUFFIXES {
                let step = 1i128 << shift;
                if units % step == 0 {
                    return format!("{}{}", units / step, suffix);
                }
            }
            return units.to_string();
        }

        for exp in DECIMAL_EXPONENTS {
            let divisor = 10i128.pow((exp + 9) as u32);
            if self.nanos % divisor != 0 {
                continue;
            }
            let mantissa = self.nanos / divisor;
            return match self.format {
                QuantityFormat::DecimalExponent if exp != 0 => format!("{}e{}", mantissa, exp),
                QuantityFormat::DecimalExponent => mantissa.to_string(),
                _ => format!("{}{}", mantissa, decimal_suffix(exp)),
            };
        }

        format!("{}n", self.nanos)
    }
}

/// Returns (format, power-of-two shift, power-of-ten exponent)
fn parse_suffix(input: &str, suffix: &str) -> Result<(QuantityFormat, u32, i32)> {
    let parsed = match suffix {
        "" => (QuantityFormat::DecimalSI, 0, 0),
        "n" => (QuantityFormat::DecimalSI, 0, -9),
        "u" => (QuantityFormat::DecimalSI, 0, -6),
        "m" => (QuantityFormat::DecimalSI, 0, -3),
        "k" => (QuantityFormat::DecimalSI, 0, 3),
        "M" => (QuantityFormat::DecimalSI, 0, 6),
        "G" => (QuantityFormat::DecimalSI, 0, 9),
        "T" => (QuantityFormat::DecimalSI, 0, 12),
        "P" => (QuantityFormat::DecimalSI, 0, 15),
        "E" => (QuantityFormat::DecimalSI, 0, 18),
        "Ki" => (QuantityFormat::BinarySI, 10, 0),
        "Mi" => (QuantityFormat::BinarySI, 20, 0),
        "Gi" => (QuantityFormat::BinarySI, 30, 0),
        "Ti" => (QuantityFormat::BinarySI, 40, 0),
        "Pi" => (QuantityFormat::BinarySI, 50, 0),
        "Ei" => (QuantityFormat::BinarySI, 60, 0),
        _ => {
            let exponent = suffix
                .strip_prefix('e')
                .or_else(|| suffix.strip_prefix('E'))
                .and_then(|e| e.parse::<i32>().ok())
                .ok_or_else(|| {
                    CoreError::invalid_quantity(input, format!("unknown suffix '{}'", suffix))
                })?;
            (QuantityFormat::DecimalExponent, 0, exponent)
        }
    };
    Ok(parsed)
}

fn decimal_suffix(exp: i32) -> &'static str {
    match exp {
        18 => "E",
        15 => "P",
        12 => "T",
        9 => "G",
        6 => "M",
        3 => "k",
        -3 => "m",
        -6 => "u",
        -9 => "n",
        _ => "",
    }
}

/// Multiply `value` by 10^scale. Negative scales divide and round up, since
/// nothing finer than one nano-unit is representable.
fn scale_by_pow10(value: i128, scale: i64) -> Option<i128> {
    if value == 0 {
        return Some(0);
    }
    if scale >= 0 {
        let factor = 10i128.checked_pow(u32::try_from(scale).ok()?)?;
        return value.checked_mul(factor);
    }
    let divisor = match u32::try_from(-scale).ok().and_then(|s| 10i128.checked_pow(s)) {
        Some(d) => d,
        None => return Some(1),
    };
    let quotient = value / divisor;
    Some(if value % divisor != 0 { quotient + 1 } else { quotient })
}

impl FromStr for Quantity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<&k8s_openapi::apimachinery::pkg::api::resource::Quantity> for Quantity {
    type Error = CoreError;

    fn try_from(q: &k8s_openapi::apimachinery::pkg::api::resource::Quantity) -> Result<Self> {
        Self::parse(&q.0)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.nanos == other.nanos
    }
}

impl Eq for Quantity {}

impl Hash for Quantity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nanos.hash(state);
    }
}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nanos.cmp(&other.nanos)
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            nanos: self.nanos.saturating_add(rhs.nanos),
            format: self.format,
        }
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Self) {
        self.nanos = self.nanos.saturating_add(rhs.nanos);
    }
}

impl Sub for Quantity {
    type Output = Quantity;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            nanos: self.nanos.saturating_sub(rhs.nanos),
            format: self.format,
        }
    }
}

impl SubAssign for Quantity {
    fn sub_assign(&mut self, rhs: Self) {
        self.nanos = self.nanos.saturating_sub(rhs.nanos);
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Quantity::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> Quantity {
        Quantity::parse(s).unwrap()
    }

    #[test]
    fn test_parse_cpu() {
        assert_eq!(q("1").as_nanos(), 1_000_000_000);
        assert_eq!(q("0.5").as_nanos(), 500_000_000);
        assert_eq!(q("100m").as_nanos(), 100_000_000);
        assert_eq!(q("2"), q("2000m"));
        assert_eq!(q(".5"), q("500m"));
    }

    #[test]
    fn test_parse_memory() {
        assert_eq!(q("1024"), q("1Ki"));
        assert_eq!(q("128Mi").as_nanos(), 128 * 1024 * 1024 * NANOS_PER_UNIT);
        assert_eq!(q("1Gi"), q("1073741824"));
        assert_eq!(q("1.5Gi"), q("1536Mi"));
        assert_eq!(q("1G"), q("1000M"));
    }

    #[test]
    fn test_parse_exponent() {
        assert_eq!(q("1e3"), q("1k"));
        assert_eq!(q("5E-3"), q("5m"));
        assert_eq!(q("1e3").format(), QuantityFormat::DecimalExponent);
        // Bare "E" is the exa suffix, not an exponent
        assert_eq!(q("1E"), q("1e18"));
    }

    #[test]
    fn test_parse_sign_and_rounding() {
        assert_eq!(q("-1").as_nanos(), -NANOS_PER_UNIT);
        assert_eq!(q("+1"), q("1"));
        assert_eq!(q("0.1n").as_nanos(), 1);
        assert!(q("0").is_zero());
    }

    #[test]
    fn test_parse_errors() {
        assert!(Quantity::parse("").is_err());
        assert!(Quantity::parse("abc").is_err());
        assert!(Quantity::parse("1.2.3").is_err());
        assert!(Quantity::parse("12x").is_err());
        assert!(Quantity::parse("1Zi").is_err());
        assert!(Quantity::parse("99999999999999999999999999999999999999999").is_err());
    }

    #[test]
    fn test_exact_arithmetic() {
        assert_eq!(q("0.1") + q("0.2"), q("0.3"));
        assert_eq!(q("4") - q("3"), q("1"));
        assert!(q("1") < q("2"));
        assert!(q("999m") < q("1"));

        let mut total = q("250m");
        total += q("750m");
        assert_eq!(total, q("1"));
        total -= q("2");
        assert!(total.is_negative());
    }

    #[test]
    fn test_canonical() {
        assert_eq!(q("1000m").to_string(), "1");
        assert_eq!(q("1500m").to_string(), "1500m");
        assert_eq!(q("1024Mi").to_string(), "1Gi");
        assert_eq!(q("1.5Gi").to_string(), "1536Mi");
        assert_eq!(q("512").to_string(), "512");
        assert_eq!(q("2000").to_string(), "2k");
        assert_eq!(q("1e3").to_string(), "1e3");
        assert_eq!(q("0").to_string(), "0");
        assert_eq!((q("1") - q("3")).to_string(), "-2");
        assert_eq!((q("8Gi") - q("512Mi")).to_string(), "7680Mi");
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&q("1536Mi")).unwrap();
        assert_eq!(json, "\"1536Mi\"");

        let back: Quantity = serde_json::from_str("\"1.5Gi\"").unwrap();
        assert_eq!(back, q("1536Mi"));
        assert!(serde_json::from_str::<Quantity>("\"bogus\"").is_err());
    }

    #[test]
    fn test_from_k8s_quantity() {
        let k8s = k8s_openapi::apimachinery::pkg::api::resource::Quantity("250m".to_string());
        assert_eq!(Quantity::try_from(&k8s).unwrap(), q("0.25"));
    }
}
