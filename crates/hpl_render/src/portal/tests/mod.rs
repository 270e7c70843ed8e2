//! Sector walk scenarios on small hand-built levels

use std::sync::Arc;

use crate::foundation::collections::{EntityId, SectorId};
use crate::foundation::math::{Color, Mat4, Vec3};
use crate::portal::container::PortalContainer;
use crate::portal::portal::Portal;
use crate::portal::visibility::SectorVisibilityContainer;
use crate::render::camera::Camera3D;
use crate::render::graphics::VertexBufferId;
use crate::render::material::StandardMaterial;
use crate::render::render_list::RenderList;
use crate::render::vertex_buffer::MeshBuffer;
use crate::scene::entity::{Entity3D, EntityStore};
use crate::scene::error::SceneError;
use crate::scene::renderable::Renderable;
use crate::scene::world::World3D;
use crate::spatial::frustum::Frustum;

fn doorway(z: f32, x: (f32, f32)) -> Vec<Vec3> {
    vec![
        Vec3::new(x.0, 0.0, z),
        Vec3::new(x.1, 0.0, z),
        Vec3::new(x.1, 3.0, z),
        Vec3::new(x.0, 3.0, z),
    ]
}

/// Rooms `a`, `b` and `c` in a row along -Z, joined by 2x3 doorways at
/// z = -5 and z = -15
fn three_rooms() -> World3D {
    let mut world = World3D::new();
    let portals = &mut world.portals;
    for (name, z) in [("a", 5.0), ("b", -5.0), ("c", -15.0)] {
        portals.add_sector(name);
        portals
            .add_sector_bounds(name, &Vec3::new(-5.0, 0.0, z - 10.0), &Vec3::new(5.0, 4.0, z))
            .unwrap();
    }
    let links = [
        ("a", "b", -5.0, 1.0),
        ("b", "a", -5.0, -1.0),
        ("b", "c", -15.0, 1.0),
        ("c", "b", -15.0, -1.0),
    ];
    for (owner, target, z, facing) in links {
        let portal = Portal::new(1, target, Vec3::new(0.0, 0.0, facing)).with_points(&doorway(z, (-1.0, 1.0)));
        portals.add_portal(portal, owner).unwrap();
    }
    portals.compile();
    world
}

fn camera_in_a() -> Frustum {
    let mut camera = Camera3D::perspective(Vec3::new(0.0, 2.0, 3.0), 60.0, 1.0, 0.1, 100.0);
    camera.look_at(Vec3::new(0.0, 2.0, -20.0), Vec3::y());
    camera.frustum()
}

fn block(position: Vec3) -> Entity3D {
    let mesh = MeshBuffer::cuboid(VertexBufferId(1), Vec3::repeat(0.5));
    let shadow = Arc::new(mesh.shadow_mesh().unwrap());
    let renderable =
        Renderable::normal(Arc::new(StandardMaterial::solid("stone")), Arc::new(mesh)).with_shadow_mesh(shadow);
    Entity3D::new("block")
        .with_renderable(renderable)
        .with_bounds(Vec3::repeat(-0.5), Vec3::repeat(0.5))
        .with_matrix(Mat4::new_translation(&position))
}

fn sector(world: &World3D, name: &str) -> SectorId {
    world.portals.sector_by_name(name).unwrap()
}

fn visible(world: &mut World3D, frustum: &Frustum) -> RenderList {
    let mut list = RenderList::new();
    list.set_frustum(frustum);
    world.portals.get_visible(&world.entities, frustum, &mut list);
    list
}

#[test]
fn test_camera_sees_through_portal_chain() {
    let mut world = three_rooms();
    visible(&mut world, &camera_in_a());
    let expected = vec![sector(&world, "a"), sector(&world, "b"), sector(&world, "c")];
    assert_eq!(world.portals.visible_sectors_list(), expected.as_slice());
}

#[test]
fn test_closed_portal_stops_the_walk() {
    let mut world = three_rooms();
    let a = sector(&world, "a");
    let key = world.portals.sector(a).unwrap().portal_keys(a)[0];
    assert!(world.portals.set_portal_active(key, false));

    visible(&mut world, &camera_in_a());
    assert_eq!(world.portals.visible_sectors_list(), &[a]);
}

#[test]
fn test_closed_inner_portal_hides_last_room() {
    let mut world = three_rooms();
    let b = sector(&world, "b");
    let inner = world
        .portals
        .sector(b)
        .unwrap()
        .portal_keys(b)
        .into_iter()
        .find(|&key| world.portals.portal(key).unwrap().target_name() == "c")
        .unwrap();
    world.portals.set_portal_active(inner, false);

    visible(&mut world, &camera_in_a());
    assert_eq!(world.portals.visible_sectors_list(), &[sector(&world, "a"), b]);
}

#[test]
fn test_portal_facing_away_is_ignored() {
    let mut world = World3D::new();
    for (name, z) in [("a", 5.0), ("b", -5.0)] {
        world.portals.add_sector(name);
        world
            .portals
            .add_sector_bounds(name, &Vec3::new(-5.0, 0.0, z - 10.0), &Vec3::new(5.0, 4.0, z))
            .unwrap();
    }
    let backwards = Portal::new(1, "b", Vec3::new(0.0, 0.0, -1.0)).with_points(&doorway(-5.0, (-1.0, 1.0)));
    world.portals.add_portal(backwards, "a").unwrap();
    world.portals.compile();

    visible(&mut world, &camera_in_a());
    assert_eq!(world.portals.visible_sectors_list(), &[sector(&world, "a")]);
}

#[test]
fn test_objects_behind_portals_are_clipped_to_the_opening() {
    let mut world = three_rooms();
    let through_door = world.create_renderable(block(Vec3::new(0.0, 1.5, -20.0)), true);
    let beside_door = world.create_renderable(block(Vec3::new(4.5, 1.5, -24.0)), true);
    let in_room = world.create_renderable(block(Vec3::new(-3.0, 1.5, -2.0)), false);

    let list = visible(&mut world, &camera_in_a());
    assert!(list.objects().contains(&through_door));
    assert!(list.objects().contains(&in_room));
    assert!(!list.objects().contains(&beside_door));
}

#[test]
fn test_object_spanning_sectors_is_listed_once() {
    let mut world = three_rooms();
    let id = world.create_renderable(block(Vec3::new(0.0, 1.5, -5.0)), false);
    let container = world.entities.get(id).unwrap().container();
    assert_eq!(container.sectors.len(), 2);

    let list = visible(&mut world, &camera_in_a());
    assert_eq!(list.objects().iter().filter(|&&o| o == id).count(), 1);
}

#[test]
fn test_global_objects_are_only_frustum_tested() {
    let mut world = three_rooms();
    let outside = world.create_renderable(block(Vec3::new(0.0, 2.0, -40.0)), false);
    let behind = world.create_renderable(block(Vec3::new(0.0, 2.0, 20.0)), false);
    assert!(world.portals.global_dynamic_objects().contains(&outside));

    let list = visible(&mut world, &camera_in_a());
    assert!(list.objects().contains(&outside));
    assert!(!list.objects().contains(&behind));
}

#[test]
fn test_moved_object_becomes_visible_in_new_sector() {
    let mut world = three_rooms();
    let id = world.create_renderable(block(Vec3::new(4.5, 1.5, -24.0)), false);
    assert!(!visible(&mut world, &camera_in_a()).objects().contains(&id));

    world.set_position(id, Vec3::new(0.0, 1.5, -8.0));
    assert_eq!(world.entities.get(id).unwrap().container().current_sector, Some(sector(&world, "b")));
    assert!(visible(&mut world, &camera_in_a()).objects().contains(&id));
}

#[test]
fn test_first_path_wins() {
    // a opens into b and c, both of which open into d
    let mut portals = PortalContainer::new();
    for (name, min, max) in [
        ("a", Vec3::new(-10.0, 0.0, -5.0), Vec3::new(10.0, 4.0, 5.0)),
        ("b", Vec3::new(-10.0, 0.0, -15.0), Vec3::new(-0.5, 4.0, -5.0)),
        ("c", Vec3::new(0.5, 0.0, -15.0), Vec3::new(10.0, 4.0, -5.0)),
        ("d", Vec3::new(-10.0, 0.0, -25.0), Vec3::new(10.0, 4.0, -15.0)),
    ] {
        portals.add_sector(name);
        portals.add_sector_bounds(name, &min, &max).unwrap();
    }
    let forward = Vec3::new(0.0, 0.0, 1.0);
    portals
        .add_portal(Portal::new(1, "b", forward).with_points(&doorway(-5.0, (-4.0, -2.0))), "a")
        .unwrap();
    portals
        .add_portal(Portal::new(2, "c", forward).with_points(&doorway(-5.0, (2.0, 4.0))), "a")
        .unwrap();
    portals
        .add_portal(Portal::new(1, "d", forward).with_points(&doorway(-15.0, (-9.0, -1.0))), "b")
        .unwrap();
    portals
        .add_portal(Portal::new(1, "d", forward).with_points(&doorway(-15.0, (1.0, 9.0))), "c")
        .unwrap();
    portals.compile();

    let mut camera = Camera3D::perspective(Vec3::new(0.0, 2.0, 4.0), 90.0, 1.0, 0.1, 100.0);
    camera.look_at(Vec3::new(0.0, 2.0, -20.0), Vec3::y());
    let mut visibility = SectorVisibilityContainer::from_frustum(&camera.frustum());
    visibility.compute(&portals);

    let id = |name: &str| portals.sector_by_name(name).unwrap();
    assert_eq!(visibility.visible_sector_ids(), vec![id("a"), id("b"), id("d"), id("c")]);

    assert!(visibility.contains_sector(id("c")));
    // One set leaving a, one leaving b; c finds d already reached
    assert_eq!(visibility.set_count(), 2);

    let d = visibility.sector_visibility(id("d")).unwrap();
    assert_eq!(d.sets().len(), 1);
    let set = visibility.set(d.sets()[0]).unwrap();
    assert!(set.visibilities().iter().all(|v| v.portal().sector == id("b")));
}

#[test]
fn test_current_sector_is_first_by_name() {
    let mut portals = PortalContainer::new();
    let mut store = EntityStore::new();
    for name in ["beta", "alpha"] {
        portals.add_sector(name);
        portals
            .add_sector_bounds(name, &Vec3::repeat(-10.0), &Vec3::repeat(10.0))
            .unwrap();
    }
    let id = store.insert(block(Vec3::zeros()));
    assert!(portals.add(&mut store, id, false));

    let container = store.get(id).unwrap().container();
    assert_eq!(container.current_sector, portals.sector_by_name("alpha"));
    assert_eq!(container.sectors.len(), 2);
}

#[test]
fn test_explicit_reachable_list_limits_the_walk() {
    let mut world = World3D::new();
    for (name, z) in [("a", 5.0), ("b", -5.0), ("c", -15.0)] {
        world.portals.add_sector(name);
        world
            .portals
            .add_sector_bounds(name, &Vec3::new(-5.0, 0.0, z - 10.0), &Vec3::new(5.0, 4.0, z))
            .unwrap();
    }
    let mut into_b = Portal::new(1, "b", Vec3::z()).with_points(&doorway(-5.0, (-1.0, 1.0)));
    into_b.add_reachable_portal_id(7);
    world.portals.add_portal(into_b, "a").unwrap();
    world
        .portals
        .add_portal(Portal::new(2, "c", Vec3::z()).with_points(&doorway(-15.0, (-1.0, 1.0))), "b")
        .unwrap();
    world
        .portals
        .add_portal(Portal::new(7, "a", -Vec3::z()).with_points(&doorway(-5.0, (-1.0, 1.0))), "b")
        .unwrap();
    world.portals.compile();

    let a = sector(&world, "a");
    let key = world.portals.sector(a).unwrap().portal_keys(a)[0];
    let reachable = world.portals.portal(key).unwrap().reachable().to_vec();
    assert_eq!(reachable.len(), 1);
    assert_eq!(world.portals.portal(reachable[0]).unwrap().id(), 7);

    visible(&mut world, &camera_in_a());
    assert_eq!(world.portals.visible_sectors_list(), &[a, sector(&world, "b")]);
}

#[test]
fn test_unknown_target_is_a_dead_end_until_recompiled() {
    let mut world = World3D::new();
    for (name, z) in [("a", 5.0), ("b", -5.0)] {
        world.portals.add_sector(name);
        world
            .portals
            .add_sector_bounds(name, &Vec3::new(-5.0, 0.0, z - 10.0), &Vec3::new(5.0, 4.0, z))
            .unwrap();
    }
    let portal = Portal::new(1, "annex", Vec3::z()).with_points(&doorway(-5.0, (-1.0, 1.0)));
    let key = world.portals.add_portal(portal, "a").unwrap();
    world.portals.compile();
    assert_eq!(world.portals.resolve_target(world.portals.portal(key).unwrap()), None);

    visible(&mut world, &camera_in_a());
    assert_eq!(world.portals.visible_sectors_list(), &[sector(&world, "a")]);

    // Adding the sector alone does not re-resolve; compiling does
    world.portals.add_sector("annex");
    world
        .portals
        .add_sector_bounds("annex", &Vec3::new(-5.0, 0.0, -15.0), &Vec3::new(5.0, 4.0, -5.0))
        .unwrap();
    assert_eq!(world.portals.resolve_target(world.portals.portal(key).unwrap()), None);
    world.portals.compile();
    assert_eq!(
        world.portals.resolve_target(world.portals.portal(key).unwrap()),
        world.portals.sector_by_name("annex")
    );
}

#[test]
fn test_duplicate_portal_id_is_rejected() {
    let mut world = three_rooms();
    let again = Portal::new(1, "c", Vec3::z()).with_points(&doorway(-5.0, (-1.0, 1.0)));
    assert_eq!(
        world.portals.add_portal(again, "a"),
        Err(SceneError::DuplicatePortal { sector: "a".into(), id: 1 })
    );
    assert_eq!(
        world.portals.add_portal(Portal::new(9, "a", Vec3::z()), "nowhere"),
        Err(SceneError::UnknownSector("nowhere".into()))
    );
}

#[test]
fn test_light_casters_are_clipped_by_portals() {
    let mut world = three_rooms();
    let light = world.create_point_light("lamp", Vec3::new(0.0, 2.0, -10.0), Color::WHITE, 12.0);
    let through_door = world.create_renderable(block(Vec3::new(0.0, 1.5, 0.0)), true);
    let beside_door = world.create_renderable(block(Vec3::new(4.0, 1.5, 0.0)), true);
    let same_room = world.create_renderable(block(Vec3::new(3.0, 1.5, -10.0)), true);

    let frustum = camera_in_a();
    let World3D { entities, lights, portals } = &mut world;
    portals.add_light_shadow_casters(entities, &mut lights[light], &frustum);

    let casters: &[EntityId] = lights[light].static_casters();
    assert!(casters.contains(&through_door));
    assert!(casters.contains(&same_room));
    assert!(!casters.contains(&beside_door));

    let visibility = lights[light].sector_visibility().unwrap();
    assert!(visibility.sector_visibility(portals.sector_by_name("b").unwrap()).unwrap().is_start());
}

#[test]
fn test_static_casters_are_kept_until_the_light_moves() {
    let mut world = three_rooms();
    let light = world.create_point_light("lamp", Vec3::new(0.0, 2.0, -10.0), Color::WHITE, 12.0);
    let first = world.create_renderable(block(Vec3::new(2.0, 1.5, -10.0)), true);
    let frustum = camera_in_a();

    {
        let World3D { entities, lights, portals } = &mut world;
        portals.add_light_shadow_casters(entities, &mut lights[light], &frustum);
    }
    assert_eq!(world.lights[light].static_casters(), &[first]);

    // A new static object is not picked up while the light stands still
    let second = world.create_renderable(block(Vec3::new(-2.0, 1.5, -10.0)), true);
    {
        let World3D { entities, lights, portals } = &mut world;
        portals.add_light_shadow_casters(entities, &mut lights[light], &frustum);
    }
    assert_eq!(world.lights[light].static_casters(), &[first]);

    let entity = world.lights[light].entity();
    world.set_position(entity, Vec3::new(0.0, 2.0, -9.0));
    {
        let World3D { entities, lights, portals } = &mut world;
        portals.add_light_shadow_casters(entities, &mut lights[light], &frustum);
    }
    let casters = world.lights[light].static_casters();
    assert!(casters.contains(&first));
    assert!(casters.contains(&second));
}

#[test]
fn test_hidden_and_shadowless_objects_are_skipped() {
    let mut world = three_rooms();
    let hidden = world.create_renderable(block(Vec3::new(-2.0, 1.5, -2.0)), false);
    let no_shadow = world.create_renderable(block(Vec3::new(2.0, 1.5, -2.0)), false);
    let caster = world.create_renderable(block(Vec3::new(0.0, 1.5, -2.0)), false);
    world
        .entities
        .get_mut(hidden)
        .and_then(Entity3D::renderable_mut)
        .unwrap()
        .set_visible(false);
    world
        .entities
        .get_mut(no_shadow)
        .and_then(Entity3D::renderable_mut)
        .unwrap()
        .set_casts_shadows(false);

    let frustum = camera_in_a();
    let list = visible(&mut world, &frustum);
    assert!(!list.objects().contains(&hidden));
    assert!(list.objects().contains(&no_shadow));
    assert!(list.objects().contains(&caster));

    let light = world.create_point_light("lamp", Vec3::new(0.0, 3.0, 0.0), Color::WHITE, 6.0);
    let World3D { entities, lights, portals } = &mut world;
    portals.add_light_shadow_casters(entities, &mut lights[light], &frustum);
    assert_eq!(lights[light].dynamic_casters(), &[caster]);

    lights[light].set_casts_shadows(false);
    portals.add_light_shadow_casters(entities, &mut lights[light], &frustum);
    assert!(lights[light].dynamic_casters().is_empty());
}

#[test]
fn test_entities_follow_their_transform() {
    let mut world = three_rooms();
    let a = sector(&world, "a");
    let speaker = world.entities.insert(
        Entity3D::new("speaker")
            .with_bounds(Vec3::repeat(-0.5), Vec3::repeat(0.5))
            .with_matrix(Mat4::new_translation(&Vec3::new(0.0, 1.0, 0.0))),
    );
    assert!(world.portals.add_entity(&mut world.entities, speaker));
    assert!(world.portals.sector(a).unwrap().entities().contains(&speaker));

    world.set_position(speaker, Vec3::new(0.0, 1.0, -40.0));
    assert!(!world.portals.sector(a).unwrap().contains_object(speaker));
    assert!(world.portals.global_entities().contains(&speaker));

    assert!(world.portals.remove_entity(&mut world.entities, speaker));
    assert!(world.portals.global_entities().is_empty());
    assert!(!world.portals.remove_entity(&mut world.entities, speaker));
}

#[test]
fn test_add_to_sector_grows_the_sector() {
    let mut world = three_rooms();
    let a = sector(&world, "a");
    let porch = world.entities.insert(block(Vec3::new(0.0, 1.5, 8.0)));
    world.portals.add_to_sector(&mut world.entities, porch, "a").unwrap();

    let bounds = world.portals.sector(a).unwrap().bounding_volume().max();
    assert!(bounds.z >= 8.5);
    let container = world.entities.get(porch).unwrap().container();
    assert_eq!(container.sectors, vec![a]);
    assert_eq!(container.current_sector, Some(a));
    assert!(world.portals.sector(a).unwrap().static_objects().contains(&porch));

    assert_eq!(
        world.portals.add_to_sector(&mut world.entities, porch, "attic"),
        Err(SceneError::UnknownSector("attic".into()))
    );

    let outside = world.create_renderable(block(Vec3::new(0.0, 2.0, -40.0)), true);
    assert!(world.portals.global_static_objects().contains(&outside));
}

#[test]
fn test_membership_matches_sector_overlap_on_a_grid() {
    let mut world = World3D::new();
    for i in 0..3 {
        for j in 0..3 {
            let name = format!("cell_{i}_{j}");
            let min = Vec3::new(i as f32 * 4.0, 0.0, j as f32 * 4.0);
            world.portals.add_sector(&name);
            world.portals.add_sector_bounds(&name, &min, &(min + Vec3::new(4.0, 4.0, 4.0))).unwrap();
        }
    }

    let ids: Vec<EntityId> = [
        (Vec3::new(2.0, 1.0, 2.0), true),
        (Vec3::new(4.0, 1.0, 2.0), false),
        (Vec3::new(4.0, 1.0, 8.0), true),
        (Vec3::new(11.0, 1.0, 11.0), false),
        (Vec3::new(20.0, 1.0, 20.0), true),
    ]
    .into_iter()
    .map(|(position, is_static)| world.create_renderable(block(position), is_static))
    .collect();

    for &id in &ids {
        let bv = world.entities.get(id).unwrap().bounding_volume();
        let mut filed = 0;
        for (_, sector) in world.portals.sectors() {
            let overlaps = bv.intersects(sector.bounding_volume());
            assert_eq!(sector.contains_object(id), overlaps, "{} / {:?}", sector.name(), id);
            filed += usize::from(overlaps);
        }
        let global = world.portals.global_static_objects().contains(&id)
            || world.portals.global_dynamic_objects().contains(&id);
        assert_eq!(global, filed == 0);
    }
    // the block on the x = 4 / z = 8 corner touches four cells
    let corner = world.entities.get(ids[2]).unwrap().container();
    assert_eq!(corner.sectors.len(), 4);
}
