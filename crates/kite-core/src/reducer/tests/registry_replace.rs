use super::*;
use pretty_assertions::assert_eq;

fn titled(title: &'static str) -> impl Fn(&RenderContext<'_>) -> View + Send + Sync {
    move |ctx: &RenderContext<'_>| View::new("card", title).accent(&ctx.display.theme_color)
}

fn advertised_names(session: &Session) -> Vec<String> {
    session
        .advertised()
        .iter()
        .map(|capability| capability.name.clone())
        .collect()
}

#[test]
fn start_advertises_enabled_and_remote_actions_only() {
    let mut session = Session::proverbs(Config::default()).unwrap();
    let effects = session.start();
    match effects.first() {
        Some(SessionEffect::AdvertiseCapabilities(capabilities)) => {
            let names: Vec<&str> = capabilities.iter().map(|c| c.name.as_str()).collect();
            assert_eq!(names, vec![catalog::SET_THEME_COLOR, catalog::UPDATE_PROVERBS]);
        }
        other => panic!("expected capability advert first, got {other:?}"),
    }
    assert_eq!(synced(&effects), vec![&catalog::initial_state()]);
}

#[test]
fn enabling_latent_capability_readvertises() {
    let mut session = session();
    let effects = run_host(
        &mut session,
        HostAction::SetAvailability {
            name: catalog::GET_WEATHER.into(),
            availability: Availability::Enabled,
        },
    );
    assert_eq!(effects.len(), 1);
    assert_eq!(
        advertised_names(&session),
        vec![
            catalog::SET_THEME_COLOR,
            catalog::GET_WEATHER,
            catalog::UPDATE_PROVERBS
        ]
    );

    let unchanged = run_host(
        &mut session,
        HostAction::SetAvailability {
            name: catalog::GET_WEATHER.into(),
            availability: Availability::Enabled,
        },
    );
    assert!(unchanged.is_empty());
}

#[test]
fn availability_change_for_unknown_name_is_a_notice() {
    let mut session = session();
    let effects = run_host(
        &mut session,
        HostAction::SetAvailability {
            name: "launch_rockets".into(),
            availability: Availability::Enabled,
        },
    );
    assert_eq!(notices(&effects), vec![NoticeKind::Registration]);
}

#[test]
fn replacement_never_leaves_two_live_descriptors() {
    let mut session = session();
    let (first, _) = session
        .register(ActionDescriptor::render("card", "v1", titled("one")), vec!["1".into()])
        .unwrap();
    invoke(&mut session, "card-1", "card", Value::Null);
    let routed = |session: &Session| session.invocation(&"card-1".into()).map(|record| record.generation);
    assert_eq!(routed(&session), Some(first.generation()));

    let (second, effects) = session
        .register(ActionDescriptor::render("card", "v2", titled("two")), vec!["2".into()])
        .unwrap();
    let cards = session
        .registry
        .names()
        .into_iter()
        .filter(|name| *name == "card")
        .count();
    assert_eq!(cards, 1);
    assert!(second.generation() > first.generation());

    // The in-flight invocation now renders with the live version.
    let titles: Vec<&str> = renders(&effects).into_iter().map(|view| view.title.as_str()).collect();
    assert_eq!(titles, vec!["two"]);
    assert_eq!(
        session.live_view(&"card-1".into()).map(|view| view.title.as_str()),
        Some("two")
    );
    assert_eq!(routed(&session), Some(second.generation()));

    // The stale handle cannot remove the replacement.
    assert!(run_host(&mut session, HostAction::Unregister(first)).is_empty());
    assert!(session.registry.get("card").is_some());
}

#[test]
fn reregistering_with_same_deps_is_a_noop() {
    let mut session = session();
    let (first, effects) = session
        .register(ActionDescriptor::render("card", "v1", titled("one")), vec!["green".into()])
        .unwrap();
    assert_eq!(effects.len(), 1, "new capability is advertised");

    let (second, effects) = session
        .register(ActionDescriptor::render("card", "v2", titled("two")), vec!["green".into()])
        .unwrap();
    assert_eq!(first, second);
    assert!(effects.is_empty());
}

#[test]
fn unregister_withdraws_capability() {
    let mut session = session();
    let (handle, _) = session
        .register(ActionDescriptor::render("card", "v1", titled("one")), Vec::new())
        .unwrap();
    assert!(advertised_names(&session).contains(&"card".to_string()));

    let effects = run_host(&mut session, HostAction::Unregister(handle));
    assert_eq!(effects.len(), 1);
    assert!(!advertised_names(&session).contains(&"card".to_string()));

    let effects = invoke(&mut session, "card-1", "card", Value::Null);
    assert_eq!(error_code(results(&effects)[0].1), Some("unknown_action"));
}

#[test]
fn invalid_registration_through_host_is_a_notice() {
    let mut session = session();
    let effects = run_host(
        &mut session,
        HostAction::Register {
            descriptor: ActionDescriptor::render("", "nameless", titled("x")),
            deps: Vec::new(),
        },
    );
    assert_eq!(notices(&effects), vec![NoticeKind::Registration]);
}
