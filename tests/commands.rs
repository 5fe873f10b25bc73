mod common;

use common::frame_map;
use macroquad_tiled_world::{WorldError, Worlds};
use serde_json::{json, Value};

fn run(worlds: &mut Worlds, cmd: &str, args: &[Value]) -> Value {
    worlds
        .execute(cmd, args)
        .unwrap_or_else(|e| panic!("{cmd}: {e}"))
}

fn world_with_map(dir: &std::path::Path) -> (Worlds, Value) {
    let mut worlds = Worlds::new();
    let w = run(&mut worlds, "world_create", &[json!({"gravity": [0.0, 0.0]})]);
    let path = frame_map(dir);
    let summary = run(&mut worlds, "tmx_load", &[w.clone(), json!(path.to_str().expect("utf-8 path"))]);
    assert_eq!(summary["tiles"], json!(8));
    assert_eq!(summary["bodies"], json!(2));
    (worlds, w)
}

#[test]
fn sprites_through_commands() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut worlds, w) = world_with_map(dir.path());

    let s = run(
        &mut worlds,
        "sprite_create",
        &[w.clone(), json!("crate"), json!(1), json!(0.5), json!(0.0), json!(1.0), json!(1.0), json!({"type": "dynamic"})],
    );
    assert_eq!(run(&mut worlds, "sprite_count", &[w.clone()]), json!(1));
    assert_eq!(run(&mut worlds, "sprite_by_name", &[w.clone(), json!("crate")]), s);

    run(&mut worlds, "sprite_set_position", &[w.clone(), s.clone(), json!(-1.25), json!(0.5)]);
    let info = run(&mut worlds, "sprite_info", &[w.clone(), s.clone()]);
    assert_eq!(info["x"], json!(-1.25));
    assert_eq!(info["y"], json!(0.5));
    assert_eq!(info["has_body"], json!(true));
    assert_eq!(info["tile"], json!(1));

    run(&mut worlds, "sprite_set_tile", &[w.clone(), s.clone(), json!(2)]);
    let info = run(&mut worlds, "sprite_info", &[w.clone(), s.clone()]);
    assert_eq!(info["tile"], json!(2));

    let err = worlds
        .execute("sprite_set_tile", &[w.clone(), s.clone(), json!(40)])
        .unwrap_err();
    assert!(matches!(err, WorldError::NotFound { .. }));

    run(&mut worlds, "sprite_remove", &[w.clone(), s.clone()]);
    assert_eq!(run(&mut worlds, "sprite_count", &[w.clone()]), json!(0));
    assert!(worlds.execute("sprite_info", &[w.clone(), s]).is_err());
}

#[test]
fn map_queries_through_commands() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut worlds, w) = world_with_map(dir.path());

    let objects = run(&mut worlds, "objects", &[w.clone()]);
    assert_eq!(objects.as_array().map(Vec::len), Some(2));
    let info = run(&mut worlds, "map_info", &[w.clone()]);
    assert_eq!(info["width"], json!(4));

    let hits = run(&mut worlds, "query_point", &[w.clone(), json!(1.5), json!(-1.5)]);
    assert_eq!(hits["tiles"], json!(["tile_3_3"]));
    assert_eq!(hits["bodies"], json!(["tile_0_3"]));

    let sheets = run(&mut worlds, "sheet_list", &[w.clone()]);
    assert_eq!(sheets, json!([]));
}

#[test]
fn maze_through_commands() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut worlds, w) = world_with_map(dir.path());

    run(&mut worlds, "maze_enable", &[w.clone(), json!(true)]);
    let info = run(&mut worlds, "maze_info", &[w.clone()]);
    assert_eq!(info["grid_w"], json!(4));
    assert_eq!(info["grid_h"], json!(4));

    for gx in 0..4 {
        assert_eq!(run(&mut worlds, "maze_cell", &[w.clone(), json!(gx), json!(0)]), json!(true));
        assert_eq!(run(&mut worlds, "maze_cell", &[w.clone(), json!(gx), json!(1)]), json!(false));
        assert_eq!(run(&mut worlds, "maze_cell", &[w.clone(), json!(gx), json!(3)]), json!(true));
    }
    assert!(matches!(
        worlds.execute("maze_cell", &[w.clone(), json!(4), json!(0)]),
        Err(WorldError::InvalidArgument(_))
    ));

    // facing -Z walks straight into the top wall
    run(&mut worlds, "maze_set_camera", &[w.clone(), json!(1.5), json!(1.5), json!(0.0)]);
    let blocked = run(&mut worlds, "maze_move", &[w.clone(), json!(1.0), json!(0.0), json!(1.0)]);
    assert_eq!(blocked, json!(true));
    let cam = run(&mut worlds, "maze_camera", &[w.clone()]);
    assert_eq!(cam["cell_y"], json!(1));

    let bad = worlds
        .execute("maze_configure", &[w.clone(), json!({"wall_hieght": 2.0})])
        .unwrap_err();
    assert!(matches!(bad, WorldError::InvalidArgument(_)));
    run(&mut worlds, "maze_configure", &[w.clone(), json!({"fov": 75.0, "draw_ceiling": false})]);

    run(&mut worlds, "maze_enable", &[w.clone(), json!(false)]);
    assert_eq!(run(&mut worlds, "maze_info", &[w.clone()])["active"], json!(false));
}

#[test]
fn destroyed_world_is_gone() {
    let mut worlds = Worlds::new();
    let a = run(&mut worlds, "world_create", &[]);
    let b = run(&mut worlds, "world_create", &[]);
    assert_ne!(a, b);
    run(&mut worlds, "world_destroy", &[a.clone()]);
    assert!(matches!(
        worlds.execute("camera_info", &[a]),
        Err(WorldError::NotFound { kind: "world", .. })
    ));
    assert_eq!(worlds.len(), 1);
    run(&mut worlds, "camera_info", &[b]);
}
