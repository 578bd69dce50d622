//! Synthetic request bodies for traffic generation, grouped by the
//! `request_type`/content shape they exercise in the policy engine and
//! risk scanner.

use rand::prelude::*;

pub struct RequestTemplate {
    pub request_type: &'static str,
    pub queries: &'static [&'static str],
}

pub struct RequestTemplates {
    general: RequestTemplate,
    coding: RequestTemplate,
    financial: RequestTemplate,
    pii: RequestTemplate,
}

impl RequestTemplates {
    pub fn new() -> Self {
        Self {
            general: RequestTemplate {
                request_type: "chat",
                queries: &[
                    "What is the capital of France?",
                    "Explain quantum computing in simple terms.",
                    "What are the benefits of regular exercise?",
                    "How does the internet work?",
                ],
            },
            coding: RequestTemplate {
                request_type: "code_generation",
                queries: &[
                    "Write a function to reverse a string in Rust.",
                    "How do I implement a binary search tree?",
                    "What is the best way to handle errors in async code?",
                ],
            },
            financial: RequestTemplate {
                request_type: "financial_transaction",
                queries: &[
                    "Transfer $5,000 from checking to my brokerage account.",
                    "Should I invest my savings in index funds right now?",
                ],
            },
            pii: RequestTemplate {
                request_type: "chat",
                queries: &[
                    "My SSN is 123-45-6789, can you help me file taxes?",
                    "Reach me at jane.doe@example.com or (555) 123-4567.",
                ],
            },
        }
    }

    /// Generate a random query for `category`, falling back to `general`
    /// when the category name is unrecognized.
    pub fn generate(&self, category: &str) -> (&'static str, String) {
        let template = match category {
            "coding" => &self.coding,
            "financial" => &self.financial,
            "pii" => &self.pii,
            _ => &self.general,
        };
        let query = template.queries.choose(&mut rand::thread_rng()).expect("non-empty template");
        (template.request_type, query.to_string())
    }

    pub fn generate_from(&self, categories: &[String]) -> (&'static str, String) {
        if categories.is_empty() {
            return self.generate("general");
        }
        let category = categories.choose(&mut rand::thread_rng()).expect("non-empty categories");
        self.generate(category)
    }
}

impl Default for RequestTemplates {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn financial_category_maps_to_financial_transaction_type() {
        let templates = RequestTemplates::new();
        let (request_type, query) = templates.generate("financial");
        assert_eq!(request_type, "financial_transaction");
        assert!(!query.is_empty());
    }

    #[test]
    fn unknown_category_falls_back_to_general() {
        let templates = RequestTemplates::new();
        let (request_type, _) = templates.generate("nonsense");
        assert_eq!(request_type, "chat");
    }

    #[test]
    fn empty_category_list_still_generates() {
        let templates = RequestTemplates::new();
        let (_, query) = templates.generate_from(&[]);
        assert!(!query.is_empty());
    }
}
