use vtk_pipeline::filters::SphereSource;
use vtk_pipeline::interaction::{parse_records, play, Interactor, Recorder};
use vtk_pipeline::scene::{Actor, Mapper, Renderer};

fn scene() -> Renderer {
    let mut renderer = Renderer::new();
    renderer.set_size(300, 200);
    let sphere = SphereSource::new([0.0; 3], 1.0).generate().unwrap();
    renderer.add_actor(Actor::with_mapper(Mapper::with_input(sphere)));
    renderer.reset_camera();
    renderer
}

fn drive(interactor: &mut Interactor) {
    interactor.left_button_press(150, 100).unwrap();
    for step in 1..=10 {
        interactor.mouse_move(150 + 4 * step, 100 - 2 * step).unwrap();
    }
    interactor.left_button_release(190, 80).unwrap();
    interactor.right_button_press(190, 80).unwrap();
    interactor.mouse_move(190, 95).unwrap();
    interactor.right_button_release(190, 95).unwrap();
    interactor.mouse_wheel_forward().unwrap();
    interactor.mouse_wheel_backward().unwrap();
    interactor.mouse_wheel_forward().unwrap();
}

#[test]
fn recorded_session_replays_exactly() {
    let mut live = Interactor::new(scene());
    let mut recorder = Recorder::new();
    recorder.attach(&live);
    drive(&mut live);
    recorder.detach(&live);

    let dir = std::env::temp_dir().join(format!("vtk-pipeline-it-playback-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("session.log");
    recorder.save(&path).unwrap();
    let records = Recorder::load(&path).unwrap();
    std::fs::remove_dir_all(&dir).ok();
    assert_eq!(records.len(), recorder.number_of_events());

    let mut replay = Interactor::new(scene());
    let played = play(records.into_iter().map(Ok), &mut replay).unwrap();
    assert_eq!(played, recorder.number_of_events());

    let (a, b) = (live.renderer().camera(), replay.renderer().camera());
    assert_eq!(a.position(), b.position());
    assert_eq!(a.focal_point(), b.focal_point());
    assert_eq!(a.view_up(), b.view_up());
    assert_ne!(a.position(), scene().camera().position());
}

#[test]
fn playback_stops_at_a_bad_record() {
    let text = "# StreamVersion 2\nMouseMoveEvent 1 1 0 0 0 0 0\nNotAnEvent 0 0 0 0 0 0 0\nMouseMoveEvent 2 2 0 0 0 0 0\n";
    let mut interactor = Interactor::new(scene());
    assert!(play(parse_records(text), &mut interactor).is_err());
    assert_eq!(interactor.events_processed(), 1);
}
