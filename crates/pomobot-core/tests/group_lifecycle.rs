//! End-to-end scenarios through the service, registry and scheduler.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use pomobot_core::{
    ChannelId, ChannelSink, Clock, EntryCause, Event, FakeClock, GuildId, MemberId, RegistryError,
    StageList, TimerError, TimerMatch, TimerService, TimerState,
};
use tokio::sync::mpsc::UnboundedReceiver;

const GUILD: GuildId = GuildId(100);
const STUDY_HALL: ChannelId = ChannelId(200);
const LIBRARY: ChannelId = ChannelId(201);

fn service() -> (TimerService<FakeClock>, FakeClock, UnboundedReceiver<Event>) {
    let clock = FakeClock::new();
    let (sink, rx) = ChannelSink::pair();
    (TimerService::new(clock.clone(), Arc::new(sink)), clock, rx)
}

fn drain(rx: &mut UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn two_stage_timer_loops_under_the_scheduler() {
    let (service, clock, mut rx) = service();
    let scheduler = service.scheduler(StdDuration::from_secs(1));
    let group = service.create_group(GUILD, STUDY_HALL, "espresso").unwrap();

    service.setup(
        &group,
        StageList::parse("Study, 25, Good luck!; Break, 5, Have a rest.").unwrap(),
    );
    service.start(&group).unwrap();
    assert_eq!(group.lock().stage_index(), Some(0));

    clock.advance(Duration::minutes(25));
    scheduler.tick_once();
    assert_eq!(group.lock().stage_index(), Some(1));

    clock.advance(Duration::minutes(5));
    scheduler.tick_once();
    assert_eq!(group.lock().stage_index(), Some(0));

    let stages: Vec<(usize, String)> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            Event::StageEntered(entry) => Some((entry.stage_index, entry.message)),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            (0, "Good luck!".to_string()),
            (1, "Have a rest.".to_string()),
            (0, "Good luck!".to_string()),
        ]
    );
}

#[test]
fn joining_an_unconfigured_timer_still_clocks_time() {
    let (service, clock, _rx) = service();
    let espresso = service.create_group(GUILD, STUDY_HALL, "espresso").unwrap();
    let latte = service.create_group(GUILD, LIBRARY, "latte").unwrap();
    let alice = MemberId(1);

    service.join(alice, &espresso).unwrap();
    assert_eq!(espresso.lock().state(), TimerState::Stopped);
    assert!(!espresso.lock().is_configured());

    clock.advance_secs(90);
    let record = service.leave(alice).unwrap();
    assert_eq!(record.clocked_secs, 90);
    assert_eq!(record.timer_id, espresso.id());

    service.join(alice, &latte).unwrap();
    assert_eq!(
        service.registry().timer_for_member(alice).unwrap().id(),
        latte.id()
    );
}

#[test]
fn second_join_anywhere_is_refused() {
    let (service, _clock, _rx) = service();
    let espresso = service.create_group(GUILD, STUDY_HALL, "espresso").unwrap();
    let latte = service.create_group(GUILD, LIBRARY, "latte").unwrap();

    service.join(MemberId(1), &espresso).unwrap();
    assert_eq!(
        service.join(MemberId(1), &latte),
        Err(RegistryError::AlreadySubscribed {
            timer: espresso.id()
        })
    );
    assert_eq!(latte.lock().member_count(), 0);
    assert_eq!(service.leave(MemberId(2)), Err(RegistryError::NotSubscribed));
}

#[test]
fn setup_on_running_timer_starts_over() {
    let (service, clock, mut rx) = service();
    let scheduler = service.scheduler(StdDuration::from_secs(1));
    let group = service.create_group(GUILD, STUDY_HALL, "espresso").unwrap();
    service.setup(&group, StageList::parse("A, 1; B, 1; C, 1").unwrap());
    service.start(&group).unwrap();
    for _ in 0..2 {
        clock.advance_secs(60);
        scheduler.tick_once();
    }
    assert_eq!(group.lock().stage_index(), Some(2));
    drain(&mut rx);

    clock.advance_secs(10);
    let entry = service
        .setup(&group, StageList::parse("Deep Work, 50; Rest, 10").unwrap())
        .unwrap();
    assert_eq!(entry.cause, EntryCause::Restarted);
    assert_eq!(group.lock().stage_index(), Some(0));
    assert_eq!(
        group.lock().deadline(),
        Some(clock.now() + Duration::minutes(50))
    );
    assert_eq!(drain(&mut rx).len(), 1);
}

#[test]
fn failed_operations_leave_state_untouched() {
    let (service, _clock, mut rx) = service();
    let group = service.create_group(GUILD, STUDY_HALL, "espresso").unwrap();

    assert_eq!(service.start(&group), Err(TimerError::NotConfigured));
    assert_eq!(service.stop(&group), Err(TimerError::NotRunning));
    assert!(StageList::parse("Study, 25; Break, zero").is_err());
    assert!(!group.lock().is_configured());

    service.setup(&group, StageList::default_cycle());
    service.start(&group).unwrap();
    let deadline = group.lock().deadline();
    assert_eq!(service.start(&group), Err(TimerError::AlreadyRunning));
    assert_eq!(group.lock().deadline(), deadline);
    assert_eq!(drain(&mut rx).len(), 1);
}

#[test]
fn stopped_timer_restarts_without_setup() {
    let (service, clock, _rx) = service();
    let group = service.create_group(GUILD, STUDY_HALL, "espresso").unwrap();
    service.setup(&group, StageList::parse("Study, 25; Break, 5").unwrap());
    service.start(&group).unwrap();
    clock.advance(Duration::minutes(30));
    service.stop(&group).unwrap();

    // A stopped timer is never advanced by the scheduler.
    clock.advance(Duration::minutes(30));
    service.scheduler(StdDuration::from_secs(1)).tick_once();
    assert_eq!(group.lock().stage_index(), None);

    service.start(&group).unwrap();
    assert_eq!(group.lock().stage_index(), Some(0));
}

#[test]
fn groups_resolve_by_name_within_scope() {
    let (service, _clock, _rx) = service();
    service.create_group(GUILD, STUDY_HALL, "Morning Crew").unwrap();
    service.create_group(GUILD, STUDY_HALL, "Evening Crew").unwrap();
    service.create_group(GUILD, LIBRARY, "Night Owls").unwrap();
    let registry = service.registry();

    assert!(matches!(
        registry.match_timers(STUDY_HALL, GUILD, "crew", true),
        TimerMatch::Ambiguous(ref groups) if groups.len() == 2
    ));
    assert!(matches!(
        registry.match_timers(STUDY_HALL, GUILD, "owl", true),
        TimerMatch::NoMatch
    ));
    match registry.match_timers(STUDY_HALL, GUILD, "owl", false) {
        TimerMatch::Unique(group) => assert_eq!(group.channel_id(), LIBRARY),
        other => panic!("expected a unique match, got {other:?}"),
    }
}
