use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Brand voice, audience and goals used as prompt context
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BrandBrief {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub brand_voice: String,
    pub target_audience: String,
    pub goals: String,
    pub keywords: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBriefRequest {
    pub name: String,
    #[serde(default)]
    pub brand_voice: String,
    #[serde(default)]
    pub target_audience: String,
    #[serde(default)]
    pub goals: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl CreateBriefRequest {
    /// Trimmed, de-duplicated, non-empty keywords in their original order
    pub fn normalized_keywords(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.keywords
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .filter(|k| seen.insert(k.to_lowercase()))
            .collect()
    }
}

impl BrandBrief {
    /// Render the brief as prompt context for the language model
    pub fn as_prompt_context(&self) -> String {
        let mut context = format!("Brand: {}\n", self.name);
        if !self.brand_voice.is_empty() {
            context.push_str(&format!("Brand voice: {}\n", self.brand_voice));
        }
        if !self.target_audience.is_empty() {
            context.push_str(&format!("Target audience: {}\n", self.target_audience));
        }
        if !self.goals.is_empty() {
            context.push_str(&format!("Goals: {}\n", self.goals));
        }
        if !self.keywords.is_empty() {
            context.push_str(&format!("Keywords: {}\n", self.keywords.join(", ")));
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_are_normalized() {
        let request = CreateBriefRequest {
            name: "Acme".to_string(),
            brand_voice: String::new(),
            target_audience: String::new(),
            goals: String::new(),
            keywords: vec![" coffee ".to_string(), "".to_string(), "Coffee".to_string(), "espresso".to_string()],
        };
        assert_eq!(request.normalized_keywords(), vec!["coffee", "espresso"]);
    }

    #[test]
    fn test_prompt_context_skips_empty_fields() {
        let brief = BrandBrief {
            id: 1,
            user_id: 1,
            name: "Acme Roasters".to_string(),
            brand_voice: "Playful".to_string(),
            target_audience: String::new(),
            goals: "Grow Instagram".to_string(),
            keywords: vec!["coffee".to_string()],
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let context = brief.as_prompt_context();
        assert!(context.contains("Brand voice: Playful"));
        assert!(context.contains("Keywords: coffee"));
        assert!(!context.contains("Target audience"));
    }
}
