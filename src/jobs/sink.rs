// src/jobs/sink.rs
//! Persists finished job outcomes to the database

use super::poller::PollOutcome;
use super::{Job, JobSink, JobTarget};
use crate::apify_client::{normalize_item, ApifyClient, ScrapedPost};
use crate::models::listening::NewListeningHit;
use crate::services::{ContentService, ListeningService};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use sqlx::PgPool;

/// Dataset items read back after a listening scan
const SCAN_ITEM_LIMIT: u32 = 200;

pub struct AppJobSink {
    db_pool: PgPool,
    apify: Option<ApifyClient>,
}

impl AppJobSink {
    pub fn new(db_pool: PgPool, apify: Option<ApifyClient>) -> Self {
        Self { db_pool, apify }
    }

    async fn store_media(&self, content_id: i32, outcome: &PollOutcome) -> Result<(), sqlx::Error> {
        match outcome {
            PollOutcome::Completed { output_url: Some(url), .. } => {
                ContentService::set_media_ready(&self.db_pool, content_id, url).await
            }
            other => ContentService::set_media_failed(&self.db_pool, content_id, &failure_message(other)).await,
        }
    }

    async fn store_scene(&self, content_id: i32, scene_index: usize, outcome: &PollOutcome) -> Result<(), sqlx::Error> {
        match outcome {
            PollOutcome::Completed { output_url: Some(url), .. } => {
                ContentService::set_scene_video(&self.db_pool, content_id, scene_index, url).await
            }
            other => {
                ContentService::set_scene_failed(&self.db_pool, content_id, scene_index, &failure_message(other)).await
            }
        }
    }

    async fn store_scan(
        &self,
        job: &Job,
        brief_id: Option<i32>,
        platform: &str,
        keywords: &[String],
        outcome: &PollOutcome,
    ) -> Result<(), String> {
        let payload = match outcome {
            PollOutcome::Completed { payload, .. } => payload,
            other => {
                tracing::warn!("⚠️ Listening scan {} produced no hits: {}", job.id, failure_message(other));
                return Ok(());
            }
        };

        let apify = self.apify.as_ref().ok_or("Apify is not configured")?;
        let dataset_id = payload
            .get("defaultDatasetId")
            .and_then(|v| v.as_str())
            .ok_or("Scan finished without a dataset")?;

        let items = apify
            .dataset_items(dataset_id, SCAN_ITEM_LIMIT)
            .await
            .map_err(|e| e.to_string())?;

        let matcher = KeywordMatcher::new(keywords).map_err(|e| e.to_string())?;
        let hits: Vec<NewListeningHit> = items
            .iter()
            .filter_map(|item| normalize_item(item, platform))
            .filter_map(|post| matcher.to_hit(post))
            .collect();

        let inserted = ListeningService::insert_hits(&self.db_pool, job.user_id, brief_id, &hits)
            .await
            .map_err(|e| e.to_string())?;

        tracing::info!(
            "👂 Listening scan {}: {} items, {} matched, {} new",
            job.id,
            items.len(),
            hits.len(),
            inserted
        );
        Ok(())
    }
}

fn failure_message(outcome: &PollOutcome) -> String {
    match outcome {
        PollOutcome::Completed { .. } => "Job finished without an output URL".to_string(),
        PollOutcome::Failed { error } => error.clone(),
        PollOutcome::TimedOut { attempts } => format!("Timed out after {} status checks", attempts),
        PollOutcome::Cancelled => "Cancelled".to_string(),
    }
}

#[async_trait]
impl JobSink for AppJobSink {
    async fn on_finished(&self, job: &Job, outcome: &PollOutcome) {
        let result = match &job.target {
            JobTarget::None => Ok(()),
            JobTarget::ContentMedia { content_id } => {
                self.store_media(*content_id, outcome).await.map_err(|e| e.to_string())
            }
            JobTarget::ContentScene {
                content_id,
                scene_index,
            } => self
                .store_scene(*content_id, *scene_index, outcome)
                .await
                .map_err(|e| e.to_string()),
            JobTarget::ListeningScan {
                brief_id,
                platform,
                keywords,
            } => self.store_scan(job, *brief_id, platform, keywords, outcome).await,
        };

        if let Err(e) = result {
            tracing::error!("❌ Failed to store result of job {}: {}", job.id, e);
        }
    }
}

/// Case-insensitive whole-word keyword matching
pub struct KeywordMatcher {
    patterns: Vec<(String, Regex)>,
}

impl KeywordMatcher {
    pub fn new(keywords: &[String]) -> Result<Self, regex::Error> {
        let patterns = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(|k| {
                let pattern = format!(r"(?:^|\W){}(?:$|\W)", regex::escape(k));
                RegexBuilder::new(&pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|re| (k.to_string(), re))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Keywords found in `text`, in keyword order
    pub fn matches(&self, text: &str) -> Vec<String> {
        self.patterns
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn to_hit(&self, post: ScrapedPost) -> Option<NewListeningHit> {
        let matched = self.matches(&post.text);
        if matched.is_empty() {
            return None;
        }
        Some(NewListeningHit {
            platform: post.platform,
            author: post.author,
            text: post.text,
            url: post.url,
            matched_keywords: matched,
            posted_at: post.posted_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_whole_word_case_insensitive() {
        let matcher = KeywordMatcher::new(&keywords(&["coffee", "cold brew", " "])).unwrap();
        assert_eq!(matcher.matches("Best COFFEE in town"), vec!["coffee"]);
        assert_eq!(matcher.matches("Trying cold brew and coffee"), vec!["coffee", "cold brew"]);
        assert!(matcher.matches("coffeeshop vibes").is_empty());
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let matcher = KeywordMatcher::new(&keywords(&["c++"])).unwrap();
        assert!(matcher.matches("c plus plus").is_empty());
        assert!(matcher.matches("c++x").is_empty());
        assert_eq!(matcher.matches("learning c++ today"), vec!["c++"]);
    }

    #[test]
    fn test_unmatched_posts_are_dropped() {
        let matcher = KeywordMatcher::new(&keywords(&["espresso"])).unwrap();
        let post = |text: &str| ScrapedPost {
            platform: "twitter".to_string(),
            author: "a".to_string(),
            text: text.to_string(),
            url: None,
            posted_at: None,
        };

        assert!(matcher.to_hit(post("tea time")).is_none());
        let hit = matcher.to_hit(post("Espresso o'clock")).unwrap();
        assert_eq!(hit.matched_keywords, vec!["espresso"]);
        assert_eq!(hit.platform, "twitter");
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(failure_message(&PollOutcome::TimedOut { attempts: 60 }), "Timed out after 60 status checks");
        assert_eq!(failure_message(&PollOutcome::Cancelled), "Cancelled");
        assert_eq!(
            failure_message(&PollOutcome::Failed { error: "nsfw".to_string() }),
            "nsfw"
        );
    }
}
