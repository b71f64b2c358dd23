//! # Reglas de Red (CIDR)
//! src/security/rule.rs
//!
//! Una `NetworkRule` es una dirección literal más una longitud de prefijo,
//! escrita como `192.168.1.0/24`, `10.0.0.1` o `fe80::/10`.
//!
//! La comparación se hace byte a byte sobre la representación de red de
//! ambas direcciones:
//!
//! ```text
//! prefijo = 20  →  2 bytes completos + 4 bits del tercer byte
//! máscara del byte parcial = 0xFF << (8 - 4) = 0xF0
//! ```

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

/// Errores al construir una regla (son errores de configuración)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// La dirección no es una IPv4/IPv6 válida
    #[error("invalid network address in rule '{0}'")]
    InvalidAddress(String),

    /// El prefijo no es un número
    #[error("invalid prefix length in rule '{0}'")]
    InvalidPrefix(String),

    /// El prefijo supera el ancho de la dirección (32 o 128 bits)
    #[error("prefix length {prefix} exceeds {width} bits in rule '{rule}'")]
    PrefixTooLong { rule: String, prefix: u8, width: u8 },
}

/// Regla de red: dirección + longitud de prefijo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRule {
    /// Texto original de la regla, usado en los logs
    source: String,
    network: IpAddr,
    prefix_len: u8,
}

/// Ancho en bits de la familia de una dirección
fn bit_width(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// Bytes de red de una dirección (4 para IPv4, 16 para IPv6)
fn address_bytes(addr: &IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

impl NetworkRule {
    /// Crea una regla validando que el prefijo quepa en la dirección
    pub fn new(network: IpAddr, prefix_len: u8) -> Result<Self, RuleError> {
        let source = format!("{}/{}", network, prefix_len);
        Self::build(source, network, prefix_len)
    }

    fn build(source: String, network: IpAddr, prefix_len: u8) -> Result<Self, RuleError> {
        let width = bit_width(&network);
        if prefix_len > width {
            return Err(RuleError::PrefixTooLong {
                rule: source,
                prefix: prefix_len,
                width,
            });
        }

        Ok(Self {
            source,
            network,
            prefix_len,
        })
    }

    /// Verifica si `candidate` pertenece a la red de esta regla
    ///
    /// Familias distintas nunca coinciden. Se comparan primero los
    /// `prefix_len / 8` bytes completos y luego, si sobran bits, los
    /// `prefix_len % 8` bits altos del siguiente byte.
    ///
    /// # Ejemplo
    /// ```
    /// use myweb::security::NetworkRule;
    ///
    /// let rule: NetworkRule = "192.168.1.0/24".parse().unwrap();
    /// assert!(rule.matches("192.168.1.77".parse().unwrap()));
    /// assert!(!rule.matches("192.168.2.1".parse().unwrap()));
    /// ```
    pub fn matches(&self, candidate: IpAddr) -> bool {
        let network = address_bytes(&self.network);
        let client = address_bytes(&candidate);

        if network.len() != client.len() {
            return false;
        }

        let full_bytes = (self.prefix_len / 8) as usize;
        let remaining_bits = self.prefix_len % 8;

        if network[..full_bytes] != client[..full_bytes] {
            return false;
        }

        if remaining_bits > 0 && full_bytes < network.len() {
            let mask = 0xFFu8 << (8 - remaining_bits);
            if network[full_bytes] & mask != client[full_bytes] & mask {
                return false;
            }
        }

        true
    }

    /// Dirección de red tal como se configuró
    pub fn network(&self) -> IpAddr {
        self.network
    }

    /// Longitud de prefijo en bits
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Texto original de la regla
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for NetworkRule {
    type Err = RuleError;

    /// Parsea `addr/len` o una dirección suelta (host único)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rule = s.trim();

        let (addr_part, prefix_part) = match rule.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (rule, None),
        };

        let network: IpAddr = addr_part
            .parse()
            .map_err(|_| RuleError::InvalidAddress(rule.to_string()))?;

        let prefix_len = match prefix_part {
            Some(p) => p
                .parse::<u8>()
                .map_err(|_| RuleError::InvalidPrefix(rule.to_string()))?,
            // Sin prefijo: la regla es un solo host
            None => bit_width(&network),
        };

        Self::build(rule.to_string(), network, prefix_len)
    }
}

impl fmt::Display for NetworkRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use test_case::test_case;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    /// Cálculo de referencia con aritmética de u32
    fn reference_match(network: Ipv4Addr, prefix: u8, candidate: Ipv4Addr) -> bool {
        let mask = if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - prefix as u32)
        };
        (u32::from(network) & mask) == (u32::from(candidate) & mask)
    }

    #[test_case("192.168.1.0/24", "192.168.1.5", true ; "inside /24")]
    #[test_case("192.168.1.0/24", "192.168.2.5", false ; "outside /24")]
    #[test_case("10.0.0.0/8", "10.255.3.4", true ; "inside /8")]
    #[test_case("172.16.0.0/12", "172.31.255.255", true ; "last address of /12")]
    #[test_case("172.16.0.0/12", "172.32.0.0", false ; "first address past /12")]
    #[test_case("10.0.0.0/0", "203.0.113.9", true ; "zero prefix matches everything")]
    #[test_case("127.0.0.1", "127.0.0.1", true ; "bare host matches itself")]
    #[test_case("127.0.0.1", "127.0.0.2", false ; "bare host is a /32")]
    #[test_case("fe80::/10", "fe80::1", true ; "ipv6 link local")]
    #[test_case("fe80::/10", "fec0::1", false ; "ipv6 outside /10")]
    #[test_case("10.0.0.0/8", "::ffff:10.0.0.1", false ; "families never mix")]
    #[test_case("::/0", "10.0.0.1", false ; "ipv6 any does not match ipv4")]
    fn rule_matching(rule: &str, candidate: &str, expected: bool) {
        let rule: NetworkRule = rule.parse().unwrap();
        assert_eq!(rule.matches(ip(candidate)), expected);
    }

    #[test]
    fn test_agrees_with_reference_for_every_prefix() {
        let network = Ipv4Addr::new(172, 20, 137, 66);
        let candidates = [
            Ipv4Addr::new(172, 20, 137, 66),
            Ipv4Addr::new(172, 20, 137, 67),
            Ipv4Addr::new(172, 20, 136, 66),
            Ipv4Addr::new(172, 21, 137, 66),
            Ipv4Addr::new(44, 20, 137, 66),
            Ipv4Addr::new(0, 0, 0, 0),
            Ipv4Addr::new(255, 255, 255, 255),
        ];

        for prefix in 0..=32u8 {
            let rule = NetworkRule::new(IpAddr::V4(network), prefix).unwrap();
            for candidate in candidates {
                assert_eq!(
                    rule.matches(IpAddr::V4(candidate)),
                    reference_match(network, prefix, candidate),
                    "prefix /{} candidate {}",
                    prefix,
                    candidate
                );
            }
        }
    }

    #[test]
    fn test_slash_32_matches_exactly_one() {
        let rule: NetworkRule = "192.0.2.10/32".parse().unwrap();
        let matching = (0..=255u8)
            .filter(|last| rule.matches(IpAddr::V4(Ipv4Addr::new(192, 0, 2, *last))))
            .count();
        assert_eq!(matching, 1);
    }

    #[test]
    fn test_bare_ipv6_is_full_width() {
        let rule: NetworkRule = "2001:db8::1".parse().unwrap();
        assert_eq!(rule.prefix_len(), 128);
    }

    #[test]
    fn test_invalid_address() {
        let err = "300.1.1.1/8".parse::<NetworkRule>().unwrap_err();
        assert!(matches!(err, RuleError::InvalidAddress(_)));
    }

    #[test]
    fn test_invalid_prefix() {
        let err = "10.0.0.0/abc".parse::<NetworkRule>().unwrap_err();
        assert!(matches!(err, RuleError::InvalidPrefix(_)));
    }

    #[test]
    fn test_prefix_too_long() {
        let err = "10.0.0.0/33".parse::<NetworkRule>().unwrap_err();
        assert_eq!(
            err,
            RuleError::PrefixTooLong {
                rule: "10.0.0.0/33".to_string(),
                prefix: 33,
                width: 32
            }
        );
        assert!("::/128".parse::<NetworkRule>().is_ok());
        assert!("::/129".parse::<NetworkRule>().is_err());
    }

    #[test]
    fn test_display_keeps_source() {
        let rule: NetworkRule = " 192.168.1.0/24 ".parse().unwrap();
        assert_eq!(rule.to_string(), "192.168.1.0/24");
    }
}
