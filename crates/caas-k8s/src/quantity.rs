//! Normalization of Kubernetes resource quantities
//!
//! CPU quantities become millicores, memory quantities become bytes.

use regex::Regex;
use std::sync::LazyLock;

static CPU_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)(n|u|m)?$").expect("valid cpu regex"));

static MEMORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)(Ki|Mi|Gi)?$").expect("valid memory regex"));

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * 1024 * 1024;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    #[error("invalid cpu quantity '{0}'")]
    Cpu(String),
    #[error("invalid memory quantity '{0}'")]
    Memory(String),
}

/// Parse a CPU quantity ("250000000n", "1500u", "500m", "2") into millicores
pub fn parse_cpu_usage(quantity: &str) -> Result<f64, QuantityError> {
    let invalid = || QuantityError::Cpu(quantity.to_string());
    let (number, suffix) = split(&CPU_RE, quantity.trim()).ok_or_else(invalid)?;
    let value = number.parse::<f64>().map_err(|_| invalid())?;

    let millicores = match suffix {
        "n" => value / 1e6,
        "u" => value / 1e3,
        "m" => value,
        _ => value * 1000.0,
    };

    if !millicores.is_finite() {
        return Err(invalid());
    }

    Ok(millicores)
}

/// Parse a memory quantity ("128Ki", "512Mi", "1Gi", "4096") into bytes
pub fn parse_memory_usage(quantity: &str) -> Result<u64, QuantityError> {
    let invalid = || QuantityError::Memory(quantity.to_string());
    let (number, suffix) = split(&MEMORY_RE, quantity.trim()).ok_or_else(invalid)?;

    let multiplier = match suffix {
        "Ki" => KIB,
        "Mi" => MIB,
        "Gi" => GIB,
        _ => 1,
    };

    // Whole numbers stay in integer arithmetic so large byte counts are exact
    if !number.contains('.') {
        return number
            .parse::<u64>()
            .ok()
            .and_then(|value| value.checked_mul(multiplier))
            .ok_or_else(invalid);
    }

    let bytes = number.parse::<f64>().map_err(|_| invalid())? * multiplier as f64;
    // u64::MAX as f64 rounds up to 2^64, which does not fit
    if !bytes.is_finite() || bytes.round() >= u64::MAX as f64 {
        return Err(invalid());
    }

    Ok(bytes.round() as u64)
}

/// Split a quantity into its numeric part and (possibly empty) suffix
fn split<'a>(re: &Regex, quantity: &'a str) -> Option<(&'a str, &'a str)> {
    let captures = re.captures(quantity)?;
    let number = captures.get(1)?.as_str();
    let suffix = captures.get(2).map(|m| m.as_str()).unwrap_or("");
    Some((number, suffix))
}
