use std::collections::{HashMap, HashSet};

use cgmath::{Point3, Vector2, Vector3};
use voxel_stream::{
    config::WorldConfig,
    engine_state::{
        buffer_state::ArenaError,
        device::{host_device::HostDevice, DeviceContext},
        rendering::{
            meshing::face::{Face, FaceKey},
            DrawCall,
        },
        voxels::{
            block::{block_side::BlockSide, block_type::BlockType},
            chunk::{CHUNK_DEPTH, CHUNK_WIDTH},
            world::{window::ScrollDirection, World, WorldError},
        },
    },
};

fn test_config(side: i32) -> WorldConfig {
    WorldConfig {
        side,
        seed: Some(20_240),
        chunk_face_capacity: 32_768,
        ..WorldConfig::default()
    }
}

fn host_world(side: i32) -> (DeviceContext<HostDevice>, World<HostDevice>) {
    let device = DeviceContext::new(HostDevice::default());
    let world = World::new(device.clone(), &test_config(side)).unwrap();
    (device, world)
}

/// Absolute voxel `(x, z)` of the hot block's corner.
fn hot_base(world: &World<HostDevice>) -> (i32, i32) {
    let origin = world.hot_origin();
    (origin.x * CHUNK_WIDTH, origin.y * CHUNK_DEPTH)
}

fn hot_coords(world: &World<HostDevice>) -> Vec<Vector2<i32>> {
    let origin = world.hot_origin();
    vec![
        origin,
        origin + Vector2::new(0, 1),
        origin + Vector2::new(1, 0),
        origin + Vector2::new(1, 1),
    ]
}

fn hot_keys(world: &World<HostDevice>) -> HashMap<(i32, i32), HashSet<FaceKey>> {
    hot_coords(world)
        .into_iter()
        .map(|coord| {
            let keys = world.hot_chunk(coord).unwrap().faces.keys().collect();
            ((coord.x, coord.y), keys)
        })
        .collect()
}

fn geometry(world: &World<HostDevice>, coord: Vector2<i32>) -> Vec<Face> {
    world.chunk_faces(coord).unwrap()
}

fn assert_window_invariant(world: &World<HostDevice>) {
    let side = world.side();
    let chunks = world.chunks();
    assert_eq!(chunks.len(), side * side);

    let hot: HashSet<_> = chunks
        .iter()
        .filter(|chunk| chunk.hot)
        .map(|chunk| (chunk.coord.x, chunk.coord.y))
        .collect();
    let expected: HashSet<_> = hot_coords(world).iter().map(|c| (c.x, c.y)).collect();
    assert_eq!(hot, expected);

    let half = (side / 2) as i32;
    assert_eq!(world.hot_origin(), world.offset() + Vector2::new(half - 1, half - 1));
    for chunk in &chunks {
        let grid = Vector2::new(chunk.grid.0 as i32, chunk.grid.1 as i32);
        assert_eq!(chunk.coord, world.offset() + grid);
        assert_eq!(world.is_hot(chunk.coord), chunk.hot);
    }
}

#[test]
fn window_keeps_four_adjacent_hot_chunks_while_scrolling() {
    let (_device, mut world) = host_world(4);
    assert_window_invariant(&world);

    for direction in [
        ScrollDirection::PositiveX,
        ScrollDirection::PositiveZ,
        ScrollDirection::PositiveZ,
        ScrollDirection::NegativeX,
        ScrollDirection::NegativeX,
        ScrollDirection::NegativeZ,
    ] {
        assert!(world.scroll(direction).unwrap());
        assert_window_invariant(&world);
    }
    assert_eq!(world.offset(), Vector2::new(-1, 1));
}

#[test]
fn move_towards_takes_one_step_x_first() {
    let (_device, mut world) = host_world(4);
    assert!(!world.move_towards(Vector2::new(2, 2)).unwrap());

    assert!(world.move_towards(Vector2::new(5, 0)).unwrap());
    assert_eq!(world.offset(), Vector2::new(1, 0));
    assert!(world.move_towards(Vector2::new(3, 0)).unwrap());
    assert_eq!(world.offset(), Vector2::new(1, -1));
}

#[test]
fn place_then_destroy_restores_the_face_index() {
    let (_device, mut world) = host_world(4);
    let (base_x, base_z) = hot_base(&world);
    let (x, z) = (base_x + CHUNK_WIDTH, base_z + CHUNK_DEPTH - 1);
    let surface = world.surface_height(x, z).unwrap();
    let clicked = Point3::new(x, surface, z);
    let target = Point3::new(x, surface - 1, z);
    let before = hot_keys(&world);

    assert!(world.place_block(BlockType::COBBLE, BlockSide::UP, clicked).unwrap());
    assert_eq!(world.block_at(target), Some(BlockType::COBBLE));
    assert!(world.face_at(BlockSide::UP, target).is_some());
    assert!(world.face_at(BlockSide::UP, clicked).is_none());
    assert_ne!(hot_keys(&world), before);

    assert!(world.destroy_block(BlockSide::UP, target).unwrap());
    assert_eq!(world.block_at(target), Some(BlockType::AIR));
    assert!(world.face_at(BlockSide::UP, clicked).is_some());
    assert_eq!(hot_keys(&world), before);
}

#[test]
fn placed_faces_hold_the_material_at_the_local_position() {
    let (_device, mut world) = host_world(4);
    let (base_x, base_z) = hot_base(&world);
    let (x, z) = (base_x + 10, base_z + 20);
    let surface = world.surface_height(x, z).unwrap();
    let target = Point3::new(x, surface - 1, z);

    assert!(world
        .place_block(BlockType::GLASS, BlockSide::UP, Point3::new(x, surface, z))
        .unwrap());
    assert_eq!(
        world.face_at(BlockSide::UP, target),
        Some(Face::new(BlockType::GLASS, BlockSide::UP, Point3::new(10, surface - 1, 20)))
    );
    // glass never hides the face below it
    assert!(world.face_at(BlockSide::UP, Point3::new(x, surface, z)).is_some());
}

#[test]
fn glass_and_its_neighbours_keep_their_shared_faces() {
    let (_device, mut world) = host_world(4);
    let (base_x, base_z) = hot_base(&world);
    let (x, z) = (base_x + 10, base_z + 20);
    let surface = world.surface_height(x, z).unwrap();
    let ground = Point3::new(x, surface, z);
    let lower = Point3::new(x, surface - 1, z);
    let upper = Point3::new(x, surface - 2, z);

    assert!(world.place_block(BlockType::GLASS, BlockSide::UP, ground).unwrap());
    let with_glass = hot_keys(&world);

    // opaque on glass
    assert!(world.place_block(BlockType::COBBLE, BlockSide::UP, lower).unwrap());
    assert!(world.face_at(BlockSide::UP, lower).is_some());
    assert!(world.face_at(BlockSide::DOWN, upper).is_some());
    assert!(world.destroy_block(BlockSide::UP, upper).unwrap());
    assert_eq!(hot_keys(&world), with_glass);

    // glass on glass
    assert!(world.place_block(BlockType::GLASS, BlockSide::UP, lower).unwrap());
    assert!(world.face_at(BlockSide::UP, lower).is_some());
    assert!(world.face_at(BlockSide::DOWN, upper).is_some());
    assert!(world.destroy_block(BlockSide::UP, upper).unwrap());
    assert_eq!(hot_keys(&world), with_glass);

    // removing the glass under an opaque block and putting it back
    assert!(world.place_block(BlockType::COBBLE, BlockSide::UP, lower).unwrap());
    let stacked = hot_keys(&world);
    assert!(world.destroy_block(BlockSide::UP, lower).unwrap());
    assert!(world.face_at(BlockSide::UP, ground).is_some());
    assert!(world.face_at(BlockSide::DOWN, upper).is_some());
    assert!(world.face_at(BlockSide::UP, lower).is_none());
    assert!(world.place_block(BlockType::GLASS, BlockSide::UP, ground).unwrap());
    assert_eq!(hot_keys(&world), stacked);
}

#[test]
fn edits_survive_scrolling_out_and_back_twice() {
    let (_device, mut world) = host_world(4);
    let (base_x, base_z) = hot_base(&world);
    let (x, z) = (base_x + CHUNK_WIDTH, base_z + 30);
    let surface = world.surface_height(x, z).unwrap();
    let target = Point3::new(x, surface - 1, z);

    assert!(world
        .place_block(BlockType::WOOD, BlockSide::UP, Point3::new(x, surface, z))
        .unwrap());
    let edited = [Vector2::new(1, 1), Vector2::new(2, 1)];
    let keys_after_edit = hot_keys(&world);
    let geometry_after_edit: Vec<_> = edited.iter().map(|&c| geometry(&world, c)).collect();

    for _ in 0..2 {
        for _ in 0..3 {
            assert!(world.scroll(ScrollDirection::PositiveX).unwrap());
        }
        assert!(world.chunk_faces(edited[0]).is_none());
        assert!(world.chunk_faces(edited[1]).is_none());

        assert!(world.scroll(ScrollDirection::NegativeX).unwrap());
        assert!(!world.is_hot(edited[1]));
        assert_eq!(geometry(&world, edited[1]), geometry_after_edit[1]);

        for _ in 0..2 {
            assert!(world.scroll(ScrollDirection::NegativeX).unwrap());
        }
        assert_eq!(world.offset(), Vector2::new(0, 0));
        assert_eq!(world.block_at(target), Some(BlockType::WOOD));
        assert_eq!(hot_keys(&world), keys_after_edit);
        for (coord, faces) in edited.iter().zip(&geometry_after_edit) {
            assert_eq!(&geometry(&world, *coord), faces);
        }
    }
    assert_eq!(world.edit_log().block_edits(edited[1]).len(), 1);
}

#[test]
fn edits_on_the_outer_ring_are_rejected() {
    let (_device, mut world) = host_world(4);
    let (base_x, base_z) = hot_base(&world);

    for (x, z) in [
        (base_x, base_z + 10),
        (base_x + 2 * CHUNK_WIDTH - 1, base_z + 10),
        (base_x + 10, base_z),
        (base_x + 10, base_z + 2 * CHUNK_DEPTH - 1),
    ] {
        let surface = world.surface_height(x, z).unwrap();
        let clicked = Point3::new(x, surface, z);
        let target = Point3::new(x, surface - 1, z);
        let before = hot_keys(&world);

        assert!(!world.place_block(BlockType::STONE, BlockSide::UP, clicked).unwrap());
        assert!(!world.destroy_block(BlockSide::UP, clicked).unwrap());
        assert_eq!(world.block_at(target), Some(BlockType::AIR));
        assert_ne!(world.block_at(clicked), Some(BlockType::AIR));
        assert_eq!(hot_keys(&world), before);
    }
    assert_eq!(world.edit_log().edited_chunks().count(), 0);
}

#[test]
fn invalid_edits_change_nothing() {
    let (_device, mut world) = host_world(4);
    let (base_x, base_z) = hot_base(&world);
    let (x, z) = (base_x + 40, base_z + 40);
    let surface = world.surface_height(x, z).unwrap();

    // clicking air, placing into solid, placing air, removing air or bedrock
    assert!(!world
        .place_block(BlockType::STONE, BlockSide::UP, Point3::new(x, surface - 3, z))
        .unwrap());
    assert!(!world
        .place_block(BlockType::STONE, BlockSide::DOWN, Point3::new(x, surface, z))
        .unwrap());
    assert!(!world
        .place_block(BlockType::AIR, BlockSide::UP, Point3::new(x, surface, z))
        .unwrap());
    assert!(!world.destroy_block(BlockSide::UP, Point3::new(x, surface - 1, z)).unwrap());
    assert!(!world.destroy_block(BlockSide::UP, Point3::new(x, 254, z)).unwrap());
    assert_eq!(world.edit_log().edited_chunks().count(), 0);
}

#[test]
fn scrolling_waits_for_the_previous_transfer() {
    let (device, mut world) = host_world(4);
    device.get_mut().set_deferred_completion(true);

    assert!(world.scroll(ScrollDirection::PositiveX).unwrap());
    assert!(world.pending_transfer().is_some());
    let waiting = world.chunks().iter().filter(|chunk| !chunk.ready).count();
    assert_eq!(waiting, 4);

    let mut draws: Vec<DrawCall> = Vec::new();
    let drawn = world.draw(&mut draws, Point3::new(150.0, 50.0, 150.0), Vector3::new(1.0, 0.0, 0.0));
    assert!(drawn <= 12);

    assert!(!world.scroll(ScrollDirection::PositiveX).unwrap());
    assert_eq!(world.offset(), Vector2::new(1, 0));

    device.get_mut().complete_pending();
    assert!(world.poll_transfers());
    assert!(world.chunks().iter().all(|chunk| chunk.ready));
    assert!(world.scroll(ScrollDirection::PositiveX).unwrap());
    assert_eq!(world.offset(), Vector2::new(2, 0));
}

#[test]
fn draw_skips_distant_chunks_behind_the_viewer() {
    let (_device, mut world) = host_world(8);
    let viewer = Point3::new(4.0 * CHUNK_WIDTH as f32, 50.0, 4.0 * CHUNK_DEPTH as f32);
    let mut draws: Vec<DrawCall> = Vec::new();

    let drawn = world.draw(&mut draws, viewer, Vector3::new(1.0, 0.0, 0.0));
    assert_eq!(drawn, draws.len());
    assert!(drawn < 64);
    assert!(!draws.iter().any(|call| call.chunk_origin == Point3::new(0, 0, 0)));
    assert!(draws
        .iter()
        .any(|call| call.chunk_origin == Point3::new(7 * CHUNK_WIDTH, 0, 4 * CHUNK_DEPTH)));

    let faces_by_origin: HashMap<_, _> = world
        .chunks()
        .into_iter()
        .map(|chunk| {
            (
                (chunk.coord.x * CHUNK_WIDTH, chunk.coord.y * CHUNK_DEPTH),
                chunk.face_count,
            )
        })
        .collect();
    for call in &draws {
        let origin = (call.chunk_origin.x, call.chunk_origin.z);
        assert_eq!(call.vertex_count, faces_by_origin[&origin] * 6);
    }

    draws.clear();
    let all = world.draw(&mut draws, viewer, Vector3::new(0.0, 0.0, 0.0));
    assert!(all < 64);
    assert!(all > drawn / 2);
}

#[test]
fn ground_and_wall_checks_read_the_hot_voxels() {
    let (_device, world) = host_world(4);
    let (base_x, base_z) = hot_base(&world);
    let (x, z) = (base_x + 50, base_z + 50);
    let surface = world.surface_height(x, z).unwrap();
    let column = |y: f32| Point3::new(x as f32 + 0.5, y, z as f32 + 0.5);

    assert_eq!(world.resolve_ground(column(surface as f32 - 0.5)), Some(surface as f32 - 1.75));
    assert_eq!(world.resolve_ground(column(surface as f32 - 3.0)), None);

    let sky = world.open_sides(column(5.0));
    assert!(sky.positive_x && sky.negative_x && sky.positive_z && sky.negative_z);

    let buried = world.open_sides(column(200.0));
    assert!(!buried.positive_x && !buried.negative_z);

    let outside = world.open_sides(Point3::new(-500.0, 5.0, -500.0));
    assert!(!outside.positive_x && !outside.positive_z);
}

#[test]
fn exhausted_device_memory_is_fatal() {
    let device = DeviceContext::new(HostDevice::default().with_memory_limit(1_000_000));
    let result = World::new(device, &test_config(4));
    assert!(matches!(
        result,
        Err(WorldError::Arena(ArenaError::Exhausted { .. }))
    ));
}

#[test]
fn invalid_window_sizes_are_refused() {
    let device = DeviceContext::new(HostDevice::default());
    assert!(World::new(device.clone(), &test_config(6)).is_ok());
    assert!(matches!(
        World::new(device, &test_config(5)),
        Err(WorldError::InvalidConfig(_))
    ));
}

#[test]
fn a_failed_scroll_leaves_the_window_untouched() {
    let (_device, roomy) = host_world(4);
    let largest = roomy.chunks().iter().map(|chunk| chunk.face_count).max().unwrap();
    let tight = WorldConfig {
        chunk_face_capacity: largest,
        ..test_config(4)
    };
    let mut world = World::new(DeviceContext::new(HostDevice::default()), &tight).unwrap();

    let mut steps = 0;
    let mut overflowed = false;
    for _ in 0..64 {
        let offset = world.offset();
        let chunks = world.chunks();
        let keys = hot_keys(&world);
        let hot_geometry: Vec<_> = hot_coords(&world)
            .into_iter()
            .map(|coord| geometry(&world, coord))
            .collect();

        match world.scroll(ScrollDirection::PositiveX) {
            Ok(moved) => {
                assert!(moved);
                steps += 1;
            }
            Err(WorldError::ChunkOverflow { faces, capacity, .. }) => {
                assert!(faces > capacity as usize);
                assert_eq!(world.offset(), offset);
                assert_eq!(world.chunks(), chunks);
                assert_eq!(hot_keys(&world), keys);
                let after: Vec<_> = hot_coords(&world)
                    .into_iter()
                    .map(|coord| geometry(&world, coord))
                    .collect();
                assert_eq!(after, hot_geometry);
                assert_window_invariant(&world);

                assert!(matches!(
                    world.scroll(ScrollDirection::PositiveX),
                    Err(WorldError::ChunkOverflow { .. })
                ));
                assert_eq!(world.offset(), offset);
                overflowed = true;
                break;
            }
            Err(err) => panic!("unexpected scroll failure: {err}"),
        }
    }
    assert!(overflowed);

    // the column behind was already in the window once
    if steps > 0 {
        assert!(world.scroll(ScrollDirection::NegativeX).unwrap());
        assert_window_invariant(&world);
    }
}

#[test]
fn the_default_capacity_holds_scrolled_and_edited_chunks() {
    let config = WorldConfig {
        side: 4,
        seed: Some(20_240),
        ..WorldConfig::default()
    };
    assert_eq!(config.chunk_face_capacity, 16_384);
    let mut world = World::new(DeviceContext::new(HostDevice::default()), &config).unwrap();

    for direction in [
        ScrollDirection::PositiveX,
        ScrollDirection::PositiveX,
        ScrollDirection::PositiveZ,
        ScrollDirection::PositiveZ,
        ScrollDirection::NegativeX,
    ] {
        assert!(world.scroll(direction).unwrap());
    }
    assert_window_invariant(&world);

    let (base_x, base_z) = hot_base(&world);
    let (x, z) = (base_x + CHUNK_WIDTH, base_z + CHUNK_DEPTH);
    let surface = world.surface_height(x, z).unwrap();
    let before = hot_keys(&world);
    assert!(world
        .place_block(BlockType::STONE, BlockSide::UP, Point3::new(x, surface, z))
        .unwrap());
    assert!(world
        .destroy_block(BlockSide::UP, Point3::new(x, surface - 1, z))
        .unwrap());
    assert_eq!(hot_keys(&world), before);
}
