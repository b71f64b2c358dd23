//! # Motor de Control de Acceso
//! src/security/policy.rs
//!
//! Evalúa la dirección de un cliente contra dos listas ordenadas de reglas
//! (aceptar / rechazar) en dos pasadas, como los firewalls clásicos:
//!
//! ```text
//! order = accept-first:  accept[0..] → reject[0..] → default
//! order = reject-first:  reject[0..] → accept[0..] → default
//! ```
//!
//! La primera regla que coincide decide. El orden importa solo cuando una
//! dirección está cubierta por reglas de ambas listas.

use super::rule::NetworkRule;
use crate::logging::Logger;
use std::net::IpAddr;

/// Veredicto de la política para un cliente
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessVerdict {
    Allow,
    Deny,
}

impl AccessVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessVerdict::Allow)
    }
}

/// Qué lista se revisa primero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluationOrder {
    #[default]
    AcceptFirst,
    RejectFirst,
}

/// Resultado detallado de una evaluación
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision<'a> {
    pub verdict: AccessVerdict,

    /// Regla que decidió, o `None` si se aplicó el veredicto por defecto
    pub rule: Option<&'a NetworkRule>,
}

/// Política de acceso inmutable, compartida por todos los workers
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    accept: Vec<NetworkRule>,
    reject: Vec<NetworkRule>,
    order: EvaluationOrder,
    default: AccessVerdict,
}

impl Default for AccessPolicy {
    /// Sin reglas, todo se acepta
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new(), EvaluationOrder::AcceptFirst, AccessVerdict::Allow)
    }
}

impl AccessPolicy {
    pub fn new(
        accept: Vec<NetworkRule>,
        reject: Vec<NetworkRule>,
        order: EvaluationOrder,
        default: AccessVerdict,
    ) -> Self {
        Self {
            accept,
            reject,
            order,
            default,
        }
    }

    /// Evalúa una dirección sin efectos secundarios
    pub fn evaluate(&self, client: IpAddr) -> Decision<'_> {
        let accept_pass = (&self.accept, AccessVerdict::Allow);
        let reject_pass = (&self.reject, AccessVerdict::Deny);

        let passes = match self.order {
            EvaluationOrder::AcceptFirst => [accept_pass, reject_pass],
            EvaluationOrder::RejectFirst => [reject_pass, accept_pass],
        };

        for (rules, verdict) in passes {
            if let Some(rule) = rules.iter().find(|rule| rule.matches(client)) {
                return Decision {
                    verdict,
                    rule: Some(rule),
                };
            }
        }

        Decision {
            verdict: self.default,
            rule: None,
        }
    }

    /// Decide si un cliente (en texto) puede ser atendido
    ///
    /// Registra en el log de acceso la regla que decidió. Si la dirección
    /// no se puede interpretar, registra un error y deniega.
    ///
    /// # Ejemplo
    /// ```
    /// use myweb::logging::Logger;
    /// use myweb::security::{AccessPolicy, AccessVerdict, EvaluationOrder};
    ///
    /// let policy = AccessPolicy::new(
    ///     vec![],
    ///     vec!["192.168.1.0/24".parse().unwrap()],
    ///     EvaluationOrder::RejectFirst,
    ///     AccessVerdict::Allow,
    /// );
    /// let logger = Logger::new();
    /// assert_eq!(policy.check("192.168.1.5", &logger), AccessVerdict::Deny);
    /// assert_eq!(policy.check("10.0.0.1", &logger), AccessVerdict::Allow);
    /// ```
    pub fn check(&self, client: &str, log: &Logger) -> AccessVerdict {
        let addr: IpAddr = match client.parse() {
            Ok(addr) => addr,
            Err(_) => {
                log.log_error(&format!("IP inválida: {}", client));
                return AccessVerdict::Deny;
            }
        };

        let decision = self.evaluate(addr.to_canonical());

        if let Some(rule) = decision.rule {
            let tag = match decision.verdict {
                AccessVerdict::Allow => "ACCEPTED",
                AccessVerdict::Deny => "REJECTED",
            };
            log.log_access(&format!("{} - {} by rule: {}", client, tag, rule));
        }

        decision.verdict
    }

    pub fn accept_rules(&self) -> &[NetworkRule] {
        &self.accept
    }

    pub fn reject_rules(&self) -> &[NetworkRule] {
        &self.reject
    }

    pub fn order(&self) -> EvaluationOrder {
        self.order
    }

    pub fn default_verdict(&self) -> AccessVerdict {
        self.default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn rules(list: &[&str]) -> Vec<NetworkRule> {
        list.iter().map(|r| r.parse().unwrap()).collect()
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn policy(accept: &[&str], reject: &[&str], order: EvaluationOrder, default: AccessVerdict) -> AccessPolicy {
        AccessPolicy::new(rules(accept), rules(reject), order, default)
    }

    #[test]
    fn test_reject_first_denies_subnet() {
        let p = policy(&[], &["192.168.1.0/24"], EvaluationOrder::RejectFirst, AccessVerdict::Allow);
        let decision = p.evaluate(ip("192.168.1.5"));

        assert_eq!(decision.verdict, AccessVerdict::Deny);
        assert_eq!(decision.rule.unwrap().as_str(), "192.168.1.0/24");
    }

    #[test]
    fn test_reject_first_logs_deciding_rule() {
        let dir = tempdir().unwrap();
        let access = dir.path().join("access.log");
        let logger = Logger::open(Some(&access), None).unwrap();

        let p = policy(&[], &["192.168.1.0/24"], EvaluationOrder::RejectFirst, AccessVerdict::Allow);
        assert_eq!(p.check("192.168.1.5", &logger), AccessVerdict::Deny);

        let text = fs::read_to_string(&access).unwrap();
        assert!(text.contains("192.168.1.5 - REJECTED by rule: 192.168.1.0/24"));
    }

    #[test]
    fn test_default_verdict_is_not_logged() {
        let dir = tempdir().unwrap();
        let access = dir.path().join("access.log");
        let logger = Logger::open(Some(&access), None).unwrap();

        let p = policy(&["10.0.0.0/8"], &[], EvaluationOrder::AcceptFirst, AccessVerdict::Deny);
        assert_eq!(p.check("172.16.0.1", &logger), AccessVerdict::Deny);

        let text = fs::read_to_string(&access).unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn test_order_decides_overlap() {
        let accept = ["10.1.0.0/16"];
        let reject = ["10.0.0.0/8"];
        let overlapping = ip("10.1.2.3");

        let accept_first = policy(&accept, &reject, EvaluationOrder::AcceptFirst, AccessVerdict::Deny);
        let reject_first = policy(&accept, &reject, EvaluationOrder::RejectFirst, AccessVerdict::Deny);

        assert_eq!(accept_first.evaluate(overlapping).verdict, AccessVerdict::Allow);
        assert_eq!(reject_first.evaluate(overlapping).verdict, AccessVerdict::Deny);
    }

    #[test]
    fn test_order_irrelevant_without_overlap() {
        let accept = ["10.1.0.0/16", "192.168.0.0/16"];
        let reject = ["10.0.0.0/8", "172.16.0.0/12"];

        for default in [AccessVerdict::Allow, AccessVerdict::Deny] {
            let a = policy(&accept, &reject, EvaluationOrder::AcceptFirst, default);
            let r = policy(&accept, &reject, EvaluationOrder::RejectFirst, default);

            for addr in ["192.168.4.4", "172.20.0.1", "10.2.0.1", "8.8.8.8", "::1"] {
                let addr = ip(addr);
                let in_accept = a.accept_rules().iter().any(|rule| rule.matches(addr));
                let in_reject = a.reject_rules().iter().any(|rule| rule.matches(addr));
                if in_accept && in_reject {
                    continue;
                }
                assert_eq!(a.evaluate(addr).verdict, r.evaluate(addr).verdict, "{}", addr);
            }
        }
    }

    #[test]
    fn test_first_rule_in_declaration_order_wins() {
        let p = policy(&["10.0.0.0/8", "10.1.0.0/16"], &[], EvaluationOrder::AcceptFirst, AccessVerdict::Deny);
        let decision = p.evaluate(ip("10.1.1.1"));
        assert_eq!(decision.rule.unwrap().as_str(), "10.0.0.0/8");
    }

    #[test]
    fn test_invalid_client_address_is_denied() {
        let dir = tempdir().unwrap();
        let error = dir.path().join("error.log");
        let logger = Logger::open(None, Some(&error)).unwrap();

        let p = AccessPolicy::default();
        assert_eq!(p.check("unknown", &logger), AccessVerdict::Deny);

        let text = fs::read_to_string(&error).unwrap();
        assert!(text.contains("ERROR: IP inválida: unknown"));
    }

    #[test]
    fn test_ipv4_mapped_client_uses_ipv4_rules() {
        let p = policy(&[], &["127.0.0.0/8"], EvaluationOrder::AcceptFirst, AccessVerdict::Allow);
        assert_eq!(p.check("::ffff:127.0.0.1", &Logger::new()), AccessVerdict::Deny);
    }

    #[test]
    fn test_default_policy_allows_everyone() {
        let p = AccessPolicy::default();
        assert!(p.check("203.0.113.1", &Logger::new()).is_allowed());
    }
}
