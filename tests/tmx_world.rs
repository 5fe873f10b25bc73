mod common;

use common::{frame_map, write_aseprite, write_png, write_tmx};
use macroquad::prelude::{vec2, Vec2};
use macroquad_tiled_world::{BodyOptions, TmxLoadOptions, World, WorldConfig, WorldError};

fn world() -> World {
    World::new(WorldConfig::default())
}

fn body_box(world: &World, name: &str) -> (Vec2, Vec2) {
    let physics = world.physics();
    let handle = physics.body_by_name(name).expect("named body");
    let (min, max) = physics.body_aabb(handle).expect("aabb");
    ((min + max) * 0.5, (max - min) * 0.5)
}

fn close(a: Vec2, b: Vec2) -> bool {
    (a - b).abs().max_element() < 1e-3
}

#[test]
fn top_and_bottom_rows_merge_into_two_bodies() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut w = world();
    let summary = w
        .load_tmx(frame_map(dir.path()), &TmxLoadOptions::default())
        .expect("load");

    assert_eq!(summary.tiles, 8);
    assert_eq!(summary.bodies, 2);
    assert_eq!(summary.objects, 2);
    assert!(w.tiles().iter().all(|t| t.is_collision));

    let (top_c, top_h) = body_box(&w, "tile_0_0");
    assert!(close(top_c, vec2(0.0, 1.5)), "top centre {top_c}");
    assert!(close(top_h, vec2(2.0, 0.5)), "top half {top_h}");
    let (bot_c, bot_h) = body_box(&w, "tile_0_3");
    assert!(close(bot_c, vec2(0.0, -1.5)), "bottom centre {bot_c}");
    assert!(close(bot_h, vec2(2.0, 0.5)));

    let info = w.map_info().expect("map info");
    assert_eq!((info.width, info.height), (4, 4));
    assert_eq!(info.properties.get_string("title"), Some("fixture"));
}

#[test]
fn loading_twice_gives_identical_worlds() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = frame_map(dir.path());
    let mut a = world();
    let mut b = world();
    let sa = a.load_tmx(&path, &TmxLoadOptions::default()).expect("load a");
    let sb = b.load_tmx(&path, &TmxLoadOptions::default()).expect("load b");
    assert_eq!(sa, sb);
    assert_eq!(a.objects(), b.objects());
}

#[test]
fn objects_are_reported_in_world_units() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut w = world();
    w.load_tmx(frame_map(dir.path()), &TmxLoadOptions::default())
        .expect("load");

    let spawn = w.object_by_name("spawn").expect("spawn");
    assert_eq!(spawn.kind, "start");
    // (48, 80) px on a 128 px map centred on the origin
    assert!(close(spawn.center(), vec2(-0.5, -0.5)));

    let door = w.object_by_name("door").expect("door");
    assert!(close(door.size, vec2(1.0, 1.0)));
    assert!(matches!(
        w.object_by_name("nowhere"),
        Err(WorldError::NotFound { kind: "object", .. })
    ));
}

#[test]
fn empty_collision_layer_creates_no_bodies() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_tmx(dir.path(), "empty.tmx", 3, 2, &[0; 6], "", "");
    let mut w = world();
    let summary = w.load_tmx(path, &TmxLoadOptions::default()).expect("load");
    assert_eq!(summary.tiles, 0);
    assert_eq!(summary.bodies, 0);
}

#[test]
fn custom_shape_splits_a_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let plain = write_tmx(dir.path(), "plain.tmx", 10, 1, &[1; 10], "", "");
    let mut w = world();
    let summary = w.load_tmx(plain, &TmxLoadOptions::default()).expect("load");
    assert_eq!(summary.bodies, 1);
    let (_, half) = body_box(&w, "tile_0_0");
    assert!(close(half, vec2(5.0, 0.5)));

    let mut row = [1u32; 10];
    row[5] = 2;
    let split = write_tmx(
        dir.path(),
        "split.tmx",
        10,
        1,
        &row,
        r#"<object id="1" x="0" y="0"><polygon points="0,32 16,0 32,32"/></object>"#,
        "",
    );
    let mut w = world();
    let summary = w.load_tmx(split, &TmxLoadOptions::default()).expect("load");
    assert_eq!(summary.bodies, 3);
    let (_, left) = body_box(&w, "tile_0_0");
    assert!(close(left, vec2(2.5, 0.5)));
    let (_, right) = body_box(&w, "tile_6_0");
    assert!(close(right, vec2(2.0, 0.5)));
    assert!(w.physics().body_by_name("tile_5_0").is_some());
    assert_eq!(w.tile_collision(2).expect("shapes").len(), 1);
    assert!(w.tile_collision(1).is_err());
}

#[test]
fn oversized_tile_shapes_follow_the_tile() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_png(dir.path(), "big.png", 64, 64);
    let path = dir.path().join("big.tmx");
    std::fs::write(
        &path,
        r#"<map width="2" height="1" tilewidth="32" tileheight="32">
 <tileset firstgid="1" name="big" tilewidth="64" tileheight="64" tilecount="1" columns="1">
  <image source="big.png" width="64" height="64"/>
  <tile id="0"><objectgroup><object id="1" x="0" y="0" width="64" height="64"/></objectgroup></tile>
 </tileset>
 <layer name="Collision" width="2" height="1"><data encoding="csv">1,0</data></layer>
</map>"#,
    )
    .expect("write tmx");

    let mut w = world();
    let summary = w.load_tmx(&path, &TmxLoadOptions::default()).expect("load");
    assert_eq!(summary.bodies, 1);
    // a 2x2 tile grows up and right from the cell's bottom-left corner at (-1, -0.5)
    let (centre, half) = body_box(&w, "tile_0_0");
    assert!(close(half, vec2(1.0, 1.0)), "half {half}");
    assert!(close(centre, vec2(0.0, 0.5)), "centre {centre}");
}

#[test]
fn missing_file_is_an_io_error() {
    let mut w = world();
    let err = w
        .load_tmx("does/not/exist.tmx", &TmxLoadOptions::default())
        .unwrap_err();
    assert!(matches!(err, WorldError::Io { .. }));
}

#[test]
fn queries_find_tiles_and_bodies() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut w = world();
    w.load_tmx(frame_map(dir.path()), &TmxLoadOptions::default())
        .expect("load");

    let hits = w.query_point(vec2(-1.5, 1.5));
    assert_eq!(hits.tiles, vec!["tile_0_0".to_string()]);
    assert_eq!(hits.bodies, vec!["tile_0_0".to_string()]);

    assert!(w.query_point(vec2(0.0, 0.0)).tiles.is_empty());

    let band = w.query_aabb(vec2(-2.0, -2.0), vec2(2.0, -1.2));
    assert_eq!(band.tiles.len(), 4);
    assert_eq!(band.bodies, vec!["tile_0_3".to_string()]);
}

#[test]
fn sheet_sprite_fits_its_hitbox() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (json, image) = write_aseprite(dir.path());
    let mut w = World::new(WorldConfig {
        gravity: [0.0, 0.0],
        ..Default::default()
    });
    w.add_aseprite_sheet("hero", &json, &image).expect("sheet");
    let id = w
        .create_sprite_from_sheet("hero", "hero", vec2(0.0, 0.0), vec2(1.0, 1.0), Some(&BodyOptions::default()))
        .expect("sprite");

    let info = w.sprite_info(id).expect("info");
    assert!(close(info.size, vec2(2.0, 2.0)));
    let sprite = w.sprite(id).expect("sprite");
    assert!(close(sprite.body_offset, vec2(0.0, -0.25)));
    let body = sprite.body.expect("body");
    assert!(close(w.physics().position(body).expect("pos"), vec2(0.0, -0.25)));

    w.set_sprite_position(id, vec2(3.0, 4.0)).expect("move");
    assert_eq!(w.sprite_info(id).expect("info").position, vec2(3.0, 4.0));

    let anims = w.sheet_animations("hero").expect("animations");
    assert_eq!(anims.len(), 1);
    assert!(w.add_aseprite_sheet("hero", &json, &image).is_err());
}

#[test]
fn tile_sprite_animation_swaps_gids() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut w = world();
    w.load_tmx(frame_map(dir.path()), &TmxLoadOptions::default())
        .expect("load");
    let id = w
        .create_sprite("torch", 1, vec2(0.0, 0.0), vec2(1.0, 1.0), None)
        .expect("sprite");
    w.set_sprite_animation(id, vec![1, 2], 10.0, true).expect("anim");
    w.step(0.15).expect("step");
    assert_eq!(w.sprite_info(id).expect("info").tile, Some(2));
    w.step(0.1).expect("step");
    assert_eq!(w.sprite_info(id).expect("info").tile, Some(1));

    assert!(matches!(
        w.create_sprite("ghost", 99, Vec2::ZERO, Vec2::ONE, None),
        Err(WorldError::NotFound { .. })
    ));
}
