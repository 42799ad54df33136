use super::*;

define_id! {
    pub struct TestId;
}

#[test]
fn short_truncates_long_strings() {
    let id = TestId::new("abcdefghij");
    assert_eq!(id.short(4), "abcd");
}

#[test]
fn short_leaves_short_strings_untouched() {
    let id = TestId::new("ab");
    assert_eq!(id.short(4), "ab");
}

#[test]
fn display_matches_as_str() {
    let id = TestId::new("job-1");
    assert_eq!(format!("{id}"), "job-1");
    assert_eq!(id.as_str(), "job-1");
}

#[test]
fn eq_against_str() {
    let id = TestId::new("job-1");
    assert_eq!(id, "job-1");
    assert_eq!(id, *"job-1");
}

#[test]
fn uuid_gen_produces_unique_values() {
    let gen = UuidIdGen;
    assert_ne!(gen.next(), gen.next());
}

#[test]
fn sequential_gen_is_deterministic_and_prefixed() {
    let gen = SequentialIdGen::new("job");
    assert_eq!(gen.next(), "job-1");
    assert_eq!(gen.next(), "job-2");
}
