//! Risk scoring (C2): a pure function of the request text and user role.

use orchestra_core::Request;

/// Injected SQL-injection detector. Kept as a trait so a deployment can
/// substitute a stronger scanner (e.g. a trained classifier) without
/// touching `score`.
pub trait Scanner: Send + Sync {
    /// Returns whether the query looks like a SQL-injection attempt.
    fn scan(&self, query: &str) -> bool;
}

/// Default scanner: a small fixed set of tautology/stacked-query shapes.
/// Not a full SQL parser — just enough to catch the common attack shapes
/// this scorer is meant to weight.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultScanner;

impl Scanner for DefaultScanner {
    fn scan(&self, query: &str) -> bool {
        let lower = query.to_lowercase();
        const PATTERNS: &[&str] = &[
            "' or '1'='1",
            "\" or \"1\"=\"1",
            "or 1=1",
            "union select",
            "; drop table",
            "--",
        ];
        PATTERNS.iter().any(|p| lower.contains(p))
    }
}

const SENSITIVE_TERMS: &[&str] = &["password", "secret", "key", "token"];

/// Compute the 0.0-1.0 risk score for a request (§4.2).
pub fn score(request: &Request, scanner: &dyn Scanner) -> f32 {
    let mut risk: f32 = 0.0;
    let query_lower = request.query.to_lowercase();

    if scanner.scan(&request.query) {
        risk += 0.9;
    }

    if SENSITIVE_TERMS.iter().any(|term| query_lower.contains(term)) {
        risk += 0.7;
    }

    if request.user.role == "admin" {
        risk += 0.5;
    }

    if query_lower.contains("select *") {
        risk += 0.3;
    }

    risk.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestra_core::{value_map, ClientContext, UserContext};
    use std::collections::BTreeSet;

    fn request_with(query: &str, role: &str) -> Request {
        Request {
            request_id: "r1".into(),
            request_type: "chat".into(),
            query: query.into(),
            user: UserContext {
                id: "u1".into(),
                email: "u@x.com".into(),
                role: role.into(),
                tenant_id: String::new(),
                permissions: BTreeSet::new(),
            },
            client: ClientContext {
                id: "c1".into(),
                name: String::new(),
                org_id: String::new(),
            },
            context: value_map([]),
        }
    }

    #[test]
    fn clean_query_scores_zero() {
        let r = request_with("what is the weather today", "user");
        assert_eq!(score(&r, &DefaultScanner), 0.0);
    }

    #[test]
    fn sql_injection_pattern_scores_high() {
        let r = request_with("SELECT * FROM users WHERE 1=1 OR 1=1", "user");
        // select * (+0.3) + or 1=1 (+0.9), clamped
        assert!(score(&r, &DefaultScanner) >= 0.9);
    }

    #[test]
    fn admin_role_adds_weight() {
        let r = request_with("hello", "admin");
        assert_eq!(score(&r, &DefaultScanner), 0.5);
    }

    #[test]
    fn sensitive_term_adds_weight() {
        let r = request_with("what is my password", "user");
        assert_eq!(score(&r, &DefaultScanner), 0.7);
    }

    #[test]
    fn score_never_exceeds_one() {
        let r = request_with("SELECT * FROM secrets WHERE token = 'x' OR 1=1", "admin");
        let s = score(&r, &DefaultScanner);
        assert!(s <= 1.0);
    }
}
