use std::time::Duration;

use pairlab_server::{app, config::Config, AppState};
use pairlab_sync::{
    engine::Membership,
    protocol::{Point, Polyline},
    ws::{self, BusConfig, WsBus},
    BusSignal, EditorAdapter, Participant, SessionPhase, SyncEngine, TextModel,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

type Engine = SyncEngine<TextModel, WsBus>;

async fn spawn_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = app(AppState::new(Config::default()));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{addr}/ws")
}

struct Client {
    engine: Engine,
    signals: mpsc::Receiver<BusSignal>,
}

impl Client {
    fn connect(url: &str, me: Participant) -> Self {
        let (bus, signals) = ws::connect(BusConfig::new(url));
        Self {
            engine: SyncEngine::new(me, TextModel::default(), bus),
            signals,
        }
    }
}

/// Feed both engines their transport signals until `done` holds.
async fn until(
    what: &str,
    teacher: &mut Client,
    student: &mut Client,
    done: impl Fn(&Engine, &Engine) -> bool,
) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !done(&teacher.engine, &student.engine) {
        let next = tokio::time::timeout_at(deadline, async {
            tokio::select! {
                Some(signal) = teacher.signals.recv() => (true, signal),
                Some(signal) = student.signals.recv() => (false, signal),
            }
        })
        .await;
        match next {
            Ok((true, signal)) => teacher.engine.handle_signal(signal),
            Ok((false, signal)) => student.engine.handle_signal(signal),
            Err(_) => panic!("timed out waiting for {what}"),
        }
    }
}

#[tokio::test]
async fn teacher_and_student_share_a_buffer_over_the_server() {
    let url = spawn_server().await;
    let mut teacher = Client::connect(&url, Participant::teacher("room-1", "CODE", "t1", "Ada"));
    let mut student = Client::connect(&url, Participant::student("room-1", "CODE", "s1", "Linus"));

    teacher.engine.join_room();
    until("teacher join", &mut teacher, &mut student, |t, _| {
        t.membership() == Membership::Joined
    })
    .await;

    student.engine.join_room();
    until("student join", &mut teacher, &mut student, |t, s| {
        s.membership() == Membership::Joined && t.roster().len() == 1
    })
    .await;

    student.engine.select_problem(1);
    student.engine.editor_mut().type_text("print('hi')").unwrap();
    student.engine.pump_editor_events();

    teacher.engine.start_session("s1");
    until("seed", &mut teacher, &mut student, |t, _| {
        t.buffer(1) == Some("print('hi')")
    })
    .await;
    assert!(matches!(
        student.engine.session_phase(),
        SessionPhase::Active { .. }
    ));

    teacher.engine.select_problem(1);
    assert_eq!(teacher.engine.editor().content(), "print('hi')");
    until("student follows request", &mut teacher, &mut student, |_, s| {
        s.tracked_problem() == Some(1)
    })
    .await;

    student
        .engine
        .editor_mut()
        .type_text("\nprint('bye')")
        .unwrap();
    student.engine.pump_editor_events();
    until("live edit", &mut teacher, &mut student, |t, _| {
        t.editor().content() == "print('hi')\nprint('bye')"
    })
    .await;

    teacher.engine.add_annotation(Polyline::new(
        vec![Point::new(3.0, 4.0), Point::new(30.0, 40.0)],
        "#16a34a",
    ));
    until("annotation", &mut teacher, &mut student, |_, s| {
        s.annotations().len() == 1
    })
    .await;

    teacher.engine.end_session();
    until("end", &mut teacher, &mut student, |_, s| {
        s.session_phase() == &SessionPhase::Idle
    })
    .await;

    teacher.engine.bus().shutdown().await;
    student.engine.bus().shutdown().await;
}

#[tokio::test]
async fn wrong_invite_code_is_rejected() {
    let url = spawn_server().await;
    let mut teacher = Client::connect(&url, Participant::teacher("room-2", "CODE", "t1", "Ada"));
    let mut student = Client::connect(&url, Participant::student("room-2", "GUESS", "s1", "Eve"));

    teacher.engine.join_room();
    until("teacher join", &mut teacher, &mut student, |t, _| {
        t.membership() == Membership::Joined
    })
    .await;

    student.engine.join_room();
    until("rejection", &mut teacher, &mut student, |_, s| {
        s.membership() == Membership::NotFound
    })
    .await;
    assert!(teacher.engine.roster().is_empty());
}

#[tokio::test]
async fn teacher_disconnect_clears_student_annotations() {
    let url = spawn_server().await;
    let mut teacher = Client::connect(&url, Participant::teacher("room-3", "CODE", "t1", "Ada"));
    let mut student = Client::connect(&url, Participant::student("room-3", "CODE", "s1", "Linus"));

    teacher.engine.join_room();
    until("teacher join", &mut teacher, &mut student, |t, _| {
        t.membership() == Membership::Joined
    })
    .await;
    student.engine.join_room();
    until("student join", &mut teacher, &mut student, |_, s| {
        s.membership() == Membership::Joined
    })
    .await;

    teacher
        .engine
        .add_annotation(Polyline::new(vec![Point::new(1.0, 1.0)], "#000"));
    until("annotation", &mut teacher, &mut student, |_, s| {
        s.annotations().len() == 1
    })
    .await;

    teacher.engine.bus().shutdown().await;
    until("cleared", &mut teacher, &mut student, |_, s| {
        s.annotations().is_empty()
    })
    .await;

    student.engine.bus().shutdown().await;
}
