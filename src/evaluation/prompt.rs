//! Product submissions and the chat prompt built from them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A product submitted for evaluation. Unknown fields are ignored.
///
/// Fields keep whatever JSON type the client sent, so a number in a text
/// field never invalidates the submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Product {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Value>,
}

impl Product {
    /// Read a submission from a request body. Anything that is not a JSON
    /// object yields an empty product.
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    /// `productName` and `description` must both be present and non-blank.
    pub fn is_complete(&self) -> bool {
        self.product_name().is_some() && self.description().is_some()
    }

    pub fn product_name(&self) -> Option<String> {
        field_text(&self.product_name)
    }

    pub fn description(&self) -> Option<String> {
        field_text(&self.description)
    }

    pub fn vendor_name(&self) -> Option<String> {
        field_text(&self.vendor_name)
    }

    pub fn category(&self) -> Option<String> {
        field_text(&self.category)
    }

    /// Price as submitted; zero is a valid price.
    pub fn price(&self) -> Option<String> {
        match self.price.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// A field rendered as text. Null, `false`, zero and blank strings count as
/// absent.
fn field_text(field: &Option<Value>) -> Option<String> {
    match field.as_ref()? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content,
        }
    }
}

const SYSTEM_PROMPT: &str = "You are a professional product evaluation AI. Always respond with valid JSON \
in the exact format requested. Do not include any text outside the JSON object.";

/// System and user messages for one evaluation.
pub fn build_messages(product: &Product, threshold: u8) -> Vec<ChatMessage> {
    vec![
        ChatMessage::new("system", SYSTEM_PROMPT.to_string()),
        ChatMessage::new("user", evaluation_prompt(product, threshold)),
    ]
}

fn evaluation_prompt(product: &Product, threshold: u8) -> String {
    let or = |value: Option<String>, default: &str| value.unwrap_or_else(|| default.to_string());

    format!(
        r#"You are an expert product evaluator for an AI-enhanced e-commerce catalog service.

Evaluate this product submission and respond with a JSON object in exactly this format:

{{
  "score": <number between 0-100>,
  "decision": "APPROVED" or "REJECTED",
  "reasoning": "<detailed explanation of the evaluation>",
  "category_match": "<assessment of how well the product fits its category>",
  "market_potential": "High" or "Medium" or "Low"
}}

Product Details:
- Vendor: {vendor}
- Product Name: {name}
- Description: {description}
- Price: ${price}
- Category: {category}

Evaluation Criteria (100 points total):
- Product innovation and quality (25 points)
- Market demand and competitiveness (25 points)
- Description clarity and completeness (20 points)
- Price appropriateness for market (15 points)
- Vendor credibility indicators (15 points)

Minimum passing score: {threshold}/100

Important: Respond ONLY with the JSON object, no additional text before or after."#,
        vendor = or(product.vendor_name(), "Unknown vendor"),
        name = or(product.product_name(), ""),
        description = or(product.description(), ""),
        price = or(product.price(), "unknown"),
        category = or(product.category(), "Not specified"),
        threshold = threshold,
    )
}
