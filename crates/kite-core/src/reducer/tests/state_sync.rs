use super::*;
use pretty_assertions::assert_eq;

#[test]
fn agent_push_replaces_initial_state() {
    let mut session = session();
    assert_eq!(session.state(), &catalog::initial_state());

    run_host(
        &mut session,
        HostAction::MountState(catalog::proverbs_state(["P1"])),
    );
    let effects = snapshot(&mut session, Some(1), json!({ "proverbs": ["P1", "P2"] }));

    assert_eq!(catalog::proverbs(session.state()), vec!["P1", "P2"]);
    assert!(synced(&effects).is_empty(), "agent pushes are not echoed");
    assert!(effects.contains(&SessionEffect::RequestFrame));
}

#[test]
fn local_state_equals_last_applied_snapshot() {
    let mut session = session();
    let pushes = [
        (Some(1), vec!["a"]),
        (Some(2), vec!["a", "b"]),
        (None, vec!["c"]),
        (Some(3), vec!["c", "d"]),
    ];
    for (seq, items) in pushes {
        snapshot(&mut session, seq, json!({ "proverbs": items }));
    }
    assert_eq!(catalog::proverbs(session.state()), vec!["c", "d"]);
}

#[test]
fn stale_snapshot_is_dropped_with_notice() {
    let mut session = session();
    snapshot(&mut session, Some(7), json!({ "proverbs": ["new"] }));
    let effects = snapshot(&mut session, Some(6), json!({ "proverbs": ["old"] }));

    assert_eq!(notices(&effects), vec![NoticeKind::StaleState]);
    assert_eq!(catalog::proverbs(session.state()), vec!["new"]);
}

#[test]
fn invalid_snapshot_keeps_previous_state() {
    let mut session = session();
    for bad in [
        json!({ "proverbs": "one" }),
        json!({ "proverbs": [1, 2] }),
        json!({ "proverbs": [], "mood": "sunny" }),
        json!(["P1"]),
    ] {
        let effects = snapshot(&mut session, None, bad);
        assert_eq!(notices(&effects), vec![NoticeKind::SchemaValidation]);
    }
    assert_eq!(session.state(), &catalog::initial_state());
}

#[test]
fn local_update_syncs_full_state() {
    let mut session = session();
    let effects = session.update_state(|prev| {
        let mut items = catalog::proverbs(prev);
        items.push("Measure twice, cut once.".to_string());
        catalog::proverbs_state(items)
    });

    let expected = catalog::proverbs_state([catalog::DEFAULT_PROVERB, "Measure twice, cut once."]);
    assert_eq!(synced(&effects), vec![&expected]);
    assert_eq!(effects.first(), Some(&SessionEffect::RequestFrame));
    assert_eq!(session.state(), &expected);
}

#[test]
fn set_state_with_unknown_field_is_rejected() {
    let mut session = session();
    let bad = SharedState::from_value(json!({ "proverbs": [], "draft": "x" })).unwrap();
    let effects = run_user(&mut session, UserAction::SetState(bad));

    assert_eq!(notices(&effects), vec![NoticeKind::SchemaValidation]);
    assert!(synced(&effects).is_empty());
    assert_eq!(session.state(), &catalog::initial_state());
}

#[test]
fn remount_only_honoured_before_first_agent_write() {
    let mut session = session();
    let effects = run_host(
        &mut session,
        HostAction::MountState(catalog::proverbs_state(["P0"])),
    );
    assert_eq!(synced(&effects).len(), 1);

    snapshot(&mut session, Some(1), json!({ "proverbs": ["agent"] }));
    let effects = run_host(
        &mut session,
        HostAction::MountState(catalog::proverbs_state(["P0"])),
    );
    assert!(effects.is_empty());
    assert_eq!(catalog::proverbs(session.state()), vec!["agent"]);
}

#[test]
fn remote_invocation_applies_predicted_state() {
    let mut session = session();
    let effects = invoke(
        &mut session,
        "call-1",
        catalog::UPDATE_PROVERBS,
        json!({ "proverbs": ["P1", "P3"] }),
    );

    assert_eq!(catalog::proverbs(session.state()), vec!["P1", "P3"]);
    assert!(results(&effects).is_empty(), "the agent runs remote actions");
    assert!(synced(&effects).is_empty());
    assert!(session.is_archived(&"call-1".into()));
}

#[test]
fn user_message_carries_current_state_as_context() {
    let mut session = session();
    let effects = run_user(&mut session, UserAction::SendMessage("  hi  ".into()));
    let expected_context = serde_json::to_string(&catalog::initial_state()).unwrap();
    assert_eq!(
        effects,
        vec![SessionEffect::SendUserMessage {
            message: "hi".into(),
            context: Some(expected_context),
        }]
    );
    assert!(run_user(&mut session, UserAction::SendMessage("   ".into())).is_empty());
}
