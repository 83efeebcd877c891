use fable_model::{
    ExamplesTable, GivenStories, Lifecycle, Meta, Narrative, Scenario, Scope, Story,
};

fn greeting_story() -> Story {
    Story::new("stories/greeting.story")
        .with_description("Greeting users")
        .with_meta(Meta::parse("@author Mauro"))
        .with_narrative(Narrative {
            in_order_to: "be polite".to_string(),
            as_a: "bot".to_string(),
            ..Narrative::default()
        })
        .with_scenario(
            Scenario::new("say hello")
                .with_meta(Meta::parse("@theme smoke"))
                .with_steps([
                    "Given a user named Alice",
                    "When she says hello",
                    "Then the reply is 'Hi Alice'",
                ]),
        )
}

#[test]
fn with_inherited_meta_expected_new_story_and_original_untouched() {
    let story = greeting_story();
    let inherited = story.with_inherited_meta(&Meta::parse("@author other @env qa"));

    assert_eq!(inherited.meta().property("author"), Some("Mauro"));
    assert_eq!(inherited.meta().property("env"), Some("qa"));
    assert_eq!(story.meta().property("env"), None);
    assert_eq!(inherited.scenarios(), story.scenarios());
}

#[test]
fn as_meta_with_prefix_expected_synthetic_properties() {
    let story = greeting_story();
    let meta = story.as_meta("story_");
    assert_eq!(meta.property("story_path"), Some("stories/greeting.story"));
    assert_eq!(meta.property("story_description"), Some("Greeting users"));
    assert_eq!(
        meta.property("story_narrative"),
        Some("In order to be polite\nAs a bot")
    );

    let scenario_meta = story.scenarios()[0].as_meta("");
    assert_eq!(scenario_meta.property("title"), Some("say hello"));
    assert_eq!(scenario_meta.property("givenStories"), Some(""));
    assert_eq!(scenario_meta.property("examplesTable"), Some(""));
}

#[test]
fn name_expected_last_path_segment() {
    assert_eq!(greeting_story().name(), "greeting.story");
    assert_eq!(Story::new("plain.story").name(), "plain.story");
}

#[test]
fn is_parameterised_by_examples_row_reference_expected_normal_scenario() {
    let table = ExamplesTable::new(["user"])
        .and_then(|table| table.with_values(["alice"]))
        .expect("table should build");

    let parameterised = Scenario::new("examples").with_examples(table.clone());
    assert!(parameterised.is_parameterised_by_examples());

    let referencing = Scenario::new("given row")
        .with_examples(table)
        .with_given_stories(GivenStories::parse("login.story#{0}").expect("should parse"));
    assert!(!referencing.is_parameterised_by_examples());

    assert!(!Scenario::new("plain").is_parameterised_by_examples());
}

#[test]
fn failed_to_parse_expected_placeholder_without_scenarios() {
    let story = Story::failed_to_parse("broken.story", "unexpected keyword");
    assert!(story.is_parse_failure());
    assert_eq!(story.parse_failure(), Some("unexpected keyword"));
    assert!(story.scenarios().is_empty());
    assert!(!greeting_story().is_parse_failure());
}

#[test]
fn story_json_expected_deserializes_into_model() {
    let story = greeting_story().with_lifecycle(
        Lifecycle::new().with_before(Scope::Story, ["Given a server"]),
    );
    let json = serde_json::to_string(&story).expect("story should serialize");
    let decoded: Story = serde_json::from_str(&json).expect("story should deserialize");
    assert_eq!(decoded.lifecycle().before_steps(Scope::Story), vec!["Given a server"]);
    assert_eq!(decoded.scenarios()[0].steps().len(), 3);
}
