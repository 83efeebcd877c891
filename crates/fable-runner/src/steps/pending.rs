/// Turns pending step texts into step definition stubs.
pub trait PendingStepMethodGenerator: Send + Sync {
    fn generate(&self, pending_steps: &[String]) -> Vec<String>;
}

/// Emits `#[given("...")]` style stub functions.
#[derive(Clone, Copy, Debug, Default)]
pub struct RustStubGenerator;

const KEYWORDS: [&str; 3] = ["Given", "When", "Then"];

impl RustStubGenerator {
    fn stub(&self, step: &str) -> String {
        let (keyword, pattern) = match step.split_once(char::is_whitespace) {
            Some((first, rest)) if KEYWORDS.contains(&first) => (first.to_lowercase(), rest.trim()),
            Some(("And", rest)) => ("given".to_string(), rest.trim()),
            _ => ("given".to_string(), step.trim()),
        };
        let words: Vec<String> = pattern
            .split(|ch: char| !ch.is_ascii_alphanumeric())
            .filter(|word| !word.is_empty())
            .map(str::to_lowercase)
            .collect();
        let name = if words.is_empty() {
            keyword.clone()
        } else {
            format!("{keyword}_{}", words.join("_"))
        };
        let pattern = pattern.replace('\\', "\\\\").replace('"', "\\\"");
        format!("#[{keyword}(\"{pattern}\")]\nfn {name}() {{\n    unimplemented!(\"pending\")\n}}")
    }
}

impl PendingStepMethodGenerator for RustStubGenerator {
    fn generate(&self, pending_steps: &[String]) -> Vec<String> {
        let mut stubs: Vec<String> = Vec::new();
        for step in pending_steps {
            let stub = self.stub(step);
            if !stubs.contains(&stub) {
                stubs.push(stub);
            }
        }
        stubs
    }
}
