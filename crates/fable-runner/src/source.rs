use crate::RunnerError;
use fable_model::Story;
use indexmap::IndexMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::warn;

/// Resolves a story path into a parsed story.
pub trait StorySource: Send + Sync {
    fn story_of_path(&self, path: &str) -> Result<Story, RunnerError>;
}

pub trait StoryLoader: Send + Sync {
    fn load_story_as_text(&self, path: &str) -> Result<String, RunnerError>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub trait StoryParser: Send + Sync {
    fn parse_story(&self, text: &str, path: &str) -> Result<Story, ParseError>;
}

/// Loads and parses stories on first use and caches the result.
///
/// Unparseable text yields the parse-failure placeholder rather than an error.
pub struct ParsedStories {
    loader: Arc<dyn StoryLoader>,
    parser: Arc<dyn StoryParser>,
    cache: Mutex<IndexMap<String, Story>>,
}

impl ParsedStories {
    pub fn new(loader: Arc<dyn StoryLoader>, parser: Arc<dyn StoryParser>) -> Self {
        Self {
            loader,
            parser,
            cache: Mutex::new(IndexMap::new()),
        }
    }
}

impl StorySource for ParsedStories {
    fn story_of_path(&self, path: &str) -> Result<Story, RunnerError> {
        {
            let cache = self
                .cache
                .lock()
                .map_err(|_| RunnerError::LockPoisoned("story cache"))?;
            if let Some(story) = cache.get(path) {
                return Ok(story.clone());
            }
        }

        let text = self.loader.load_story_as_text(path)?;
        let story = match self.parser.parse_story(&text, path) {
            Ok(story) => story,
            Err(error) => {
                warn!(story = %path, error = %error, "story failed to parse");
                Story::failed_to_parse(path, error.message)
            }
        };

        let mut cache = self
            .cache
            .lock()
            .map_err(|_| RunnerError::LockPoisoned("story cache"))?;
        Ok(cache.entry(path.to_string()).or_insert(story).clone())
    }
}

/// Already parsed stories keyed by path.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStories {
    stories: IndexMap<String, Story>,
}

impl InMemoryStories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_story(mut self, story: Story) -> Self {
        self.insert(story);
        self
    }

    pub fn insert(&mut self, story: Story) {
        self.stories.insert(story.path().to_string(), story);
    }

    pub fn stories(&self) -> impl Iterator<Item = &Story> {
        self.stories.values()
    }
}

impl StorySource for InMemoryStories {
    fn story_of_path(&self, path: &str) -> Result<Story, RunnerError> {
        self.stories
            .get(path)
            .cloned()
            .ok_or_else(|| RunnerError::StoryLoad {
                path: path.to_string(),
                reason: "no story registered at this path".to_string(),
            })
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStoryLoader {
    texts: IndexMap<String, String>,
}

impl MemoryStoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.texts.insert(path.into(), text.into());
        self
    }
}

impl StoryLoader for MemoryStoryLoader {
    fn load_story_as_text(&self, path: &str) -> Result<String, RunnerError> {
        self.texts
            .get(path)
            .cloned()
            .ok_or_else(|| RunnerError::StoryLoad {
                path: path.to_string(),
                reason: "no text registered at this path".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fable_model::Scenario;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TitlePerLine {
        calls: AtomicUsize,
    }

    impl StoryParser for TitlePerLine {
        fn parse_story(&self, text: &str, path: &str) -> Result<Story, ParseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.trim().is_empty() {
                return Err(ParseError::new("story has no scenarios"));
            }
            Ok(Story::new(path).with_scenarios(text.lines().map(Scenario::new).collect()))
        }
    }

    #[test]
    fn story_of_path_second_lookup_expected_cached() {
        let parser = Arc::new(TitlePerLine {
            calls: AtomicUsize::new(0),
        });
        let stories = ParsedStories::new(
            Arc::new(MemoryStoryLoader::new().with_text("setup.story", "first\nsecond")),
            Arc::clone(&parser) as Arc<dyn StoryParser>,
        );

        let story = stories
            .story_of_path("setup.story")
            .expect("story should load");
        stories
            .story_of_path("setup.story")
            .expect("story should load again");

        assert_eq!(story.scenarios().len(), 2);
        assert_eq!(parser.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn story_of_path_unparseable_text_expected_placeholder() {
        let stories = ParsedStories::new(
            Arc::new(MemoryStoryLoader::new().with_text("empty.story", "  ")),
            Arc::new(TitlePerLine {
                calls: AtomicUsize::new(0),
            }),
        );

        let story = stories
            .story_of_path("empty.story")
            .expect("placeholder should be returned");

        assert_eq!(story.parse_failure(), Some("story has no scenarios"));
    }

    #[test]
    fn story_of_path_missing_text_expected_load_error() {
        let stories = InMemoryStories::new();
        let error = stories
            .story_of_path("missing.story")
            .expect_err("missing story should fail");
        assert!(matches!(error, RunnerError::StoryLoad { path, .. } if path == "missing.story"));
    }
}
