//! S5 — a two-term AND trip rule: both data points must hold their
//! matching values simultaneously for `evaluate()` to return the rule
//! name; clearing either one clears the match.

use svts_goose::datamap::{GooseDataMap, GooseValue};
use svts_goose::rule::RuleSet;

#[test]
fn s5_trip_rule_and_requires_both_terms() {
    let map = GooseDataMap::new();
    let mut rules = RuleSet::new();
    rules.add_rule("rule", "X/Ind.stVal == true && Y/Pos.stVal == 0").unwrap();

    map.write("X/Ind.stVal", GooseValue::Bool(true));
    map.write("Y/Pos.stVal", GooseValue::Int(0));
    assert_eq!(rules.evaluate(&map), Some("rule".to_string()));

    map.write("X/Ind.stVal", GooseValue::Bool(false));
    assert_eq!(rules.evaluate(&map), None);

    map.write("X/Ind.stVal", GooseValue::Bool(true));
    map.write("Y/Pos.stVal", GooseValue::Int(1));
    assert_eq!(rules.evaluate(&map), None);
}
