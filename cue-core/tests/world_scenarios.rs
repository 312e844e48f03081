//! Whole-world scenarios driven through the public API.

use std::cell::RefCell;
use std::rc::Rc;

use cue_core::{
    BodyFlag, BodyId, BodyScalar, BodyVector, EventKind, EventLog, PhysicsEvent, PhysicsWorld,
    Plane, SpringParams, Triangle, Vec3, WorldConfig,
};

fn floor() -> Plane {
    Plane::new(Vec3::new(0.0, 0.0, 1.0), 0.0)
}

fn flat_config() -> WorldConfig {
    WorldConfig {
        gravity: Vec3::ZERO,
        ..WorldConfig::default()
    }
}

#[test]
fn test_slow_bodies_snap_to_rest_and_fire_static_once() {
    let mut world = PhysicsWorld::new(flat_config());
    let statics = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&statics);
    world.register_callback(EventKind::WorldStatic, move |_, _| {
        *counter.borrow_mut() += 1;
    });

    let a = world.add_sphere(0.5);
    let b = world.add_sphere(0.5);
    world.set_vector(b, BodyVector::Position, Vec3::new(5.0, 0.0, 0.0));
    world.set_vector(a, BodyVector::Velocity, Vec3::new(0.1, 0.0, 0.0));
    world.set_vector(b, BodyVector::Velocity, Vec3::new(0.0, -0.15, 0.0));

    let tracked = [a, b];
    world.update(1.0 / 60.0, 2, &tracked);

    assert!(world.at_rest());
    assert_eq!(world.get_vector(a, BodyVector::Velocity), Vec3::ZERO);
    assert_eq!(world.get_vector(b, BodyVector::Velocity), Vec3::ZERO);
    assert_eq!(world.stats().substeps, 0);
    assert_eq!(*statics.borrow(), 1);

    for _ in 0..5 {
        world.update(1.0 / 60.0, 2, &tracked);
    }
    assert_eq!(*statics.borrow(), 1);
}

#[test]
fn test_moving_world_simulates_then_settles() {
    let mut world = PhysicsWorld::with_sink(flat_config(), EventLog::new());
    let ball = world.add_sphere(0.5);
    world.set_vector(ball, BodyVector::Velocity, Vec3::new(2.0, 0.0, 0.0));
    let tracked = world.dynamic_body_ids();

    world.update(1.0 / 60.0, 2, &tracked);
    assert!(!world.at_rest());
    assert!(world.stats().substeps >= 2);
    assert!(world.get_vector(ball, BodyVector::Position).x > 0.0);

    let mut frames = 0;
    while !world.at_rest() && frames < 10_000 {
        world.update(1.0 / 60.0, 2, &tracked);
        frames += 1;
    }
    assert!(world.at_rest(), "world never came to rest");
    assert_eq!(world.sink().count(EventKind::WorldStatic), 1);

    world.disturb();
    assert!(!world.at_rest());
}

#[test]
fn test_add_then_remove_restores_registries() {
    let mut world = PhysicsWorld::new(WorldConfig::default());
    let keep_a = world.add_sphere(0.5);
    let keep_b = world.add_sphere(0.5);
    world.set_vector(keep_b, BodyVector::Position, Vec3::new(3.0, 0.0, 0.0));
    world.add_spring(keep_a, keep_b, SpringParams::default());
    let (bodies, springs) = (world.body_count(), world.spring_count());

    let temp = world.add_sphere(0.25);
    world.add_spring(keep_a, temp, SpringParams::default());
    world.add_spring(temp, keep_b, SpringParams::default());
    assert!(world.remove_body(temp));

    assert_eq!(world.body_count(), bodies);
    assert_eq!(world.spring_count(), springs);
    assert!(world.contains(keep_a) && world.contains(keep_b));
    assert!(!world.contains(temp));

    let plane = world.add_plane(floor());
    let pocket = world.add_bounded_plane(Triangle::new(
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
    ));
    assert!(world.remove_body(plane) && world.remove_body(pocket));
    assert_eq!(world.body_count(), bodies);

    world.remove_all();
    assert_eq!(world.body_count(), 0);
    assert_eq!(world.spring_count(), 0);
}

#[test]
fn test_ball_short_of_floor_reports_no_contact() {
    // From z = -10 moving +5 per step against the z = 0 floor: the ball
    // never reaches the plane within the step.
    let mut world = PhysicsWorld::with_sink(
        WorldConfig {
            min_substep: 1.0,
            drag_coefficient: 0.0,
            ..flat_config()
        },
        EventLog::new(),
    );
    world.add_plane(floor());
    let ball = world.add_sphere(1.0);
    world.set_scalar(ball, BodyScalar::LinearDamping, 0.0);
    world.set_vector(ball, BodyVector::Position, Vec3::new(0.0, 0.0, -10.0));
    world.set_vector(ball, BodyVector::Velocity, Vec3::new(0.0, 0.0, 5.0));

    world.simulate(1.0);

    assert_eq!(world.stats().contacts_detected, 0);
    assert!((world.get_vector(ball, BodyVector::Position).z + 5.0).abs() < 1e-12);
    assert!(world.sink().is_empty());
}

#[test]
fn test_ball_bounces_off_floor() {
    let mut world = PhysicsWorld::with_sink(WorldConfig::default(), EventLog::new());
    world.add_plane(floor());
    let ball = world.add_sphere(0.5);
    world.set_vector(ball, BodyVector::Position, Vec3::new(0.0, 0.0, 0.6));
    world.set_vector(ball, BodyVector::Velocity, Vec3::new(0.0, 0.0, -5.0));

    world.simulate(0.05);

    let vz = world.get_vector(ball, BodyVector::Velocity).z;
    assert!(vz > 0.0, "ball should be moving up after the bounce, vz = {}", vz);
    assert!(world.get_vector(ball, BodyVector::Position).z >= 0.5 - 1e-9);

    let bounce = world
        .sink()
        .events()
        .iter()
        .find_map(|e| match e {
            PhysicsEvent::SphereVsPlane { sphere, speed, .. } => Some((*sphere, *speed)),
            _ => None,
        })
        .expect("bounce event");
    assert_eq!(bounce.0, ball);
    assert!(bounce.1 > 4.0);
}

#[test]
fn test_contacts_resolve_in_time_order() {
    let mut world = PhysicsWorld::with_sink(
        WorldConfig {
            min_substep: 1.0,
            ..flat_config()
        },
        EventLog::new(),
    );
    world.add_plane(floor());

    // Each ball falls 1.0 in the step; starting gaps give crossing
    // fractions of 0.1, 0.05 and 0.9 in registration order.
    let mut balls = Vec::new();
    for gap in [0.1, 0.05, 0.9] {
        let id = world.add_sphere(0.5);
        world.set_scalar(id, BodyScalar::LinearDamping, 0.0);
        let x = balls.len() as f64 * 3.0;
        world.set_vector(id, BodyVector::Position, Vec3::new(x, 0.0, 0.5 + gap));
        world.set_vector(id, BodyVector::Velocity, Vec3::new(0.0, 0.0, -1.0));
        balls.push(id);
    }

    world.simulate(1.0);

    let order: Vec<BodyId> = world
        .sink()
        .events()
        .iter()
        .filter_map(|e| match e {
            PhysicsEvent::SphereVsPlane { sphere, .. } => Some(*sphere),
            _ => None,
        })
        .collect();
    assert_eq!(order, vec![balls[1], balls[0], balls[2]]);
}

#[test]
fn test_pocket_removal_is_deferred() {
    let mut world = PhysicsWorld::new(WorldConfig::default());
    let pocketed: Rc<RefCell<Vec<BodyId>>> = Rc::new(RefCell::new(Vec::new()));
    let seen = Rc::clone(&pocketed);
    world.register_callback(EventKind::SphereVsPocket, move |event, commands| {
        if let PhysicsEvent::SphereVsPocket { sphere, .. } = event {
            seen.borrow_mut().push(*sphere);
            commands.remove_body(*sphere);
        }
    });

    // Pocket opening level with the bed, under the ball.
    world.add_bounded_plane(Triangle::new(
        Vec3::new(-1.0, -1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
    ));
    let ball = world.add_sphere(0.1);
    let other = world.add_sphere(0.1);
    world.set_vector(ball, BodyVector::Position, Vec3::new(0.0, 0.0, 0.5));
    world.set_vector(other, BodyVector::Position, Vec3::new(5.0, 5.0, 0.5));
    world.set_flag(other, BodyFlag::UseGravity, false);
    let partner = world.add_sphere(0.1);
    world.set_vector(partner, BodyVector::Position, Vec3::new(0.0, 2.0, 0.5));
    world.set_flag(partner, BodyFlag::UseGravity, false);
    let slack = SpringParams {
        rest_length: 10.0,
        ..SpringParams::default()
    };
    world.add_spring(ball, partner, slack);

    for _ in 0..60 {
        world.simulate(1.0 / 60.0);
    }

    assert_eq!(pocketed.borrow().as_slice(), &[ball]);
    assert!(!world.contains(ball));
    assert!(world.contains(other));
    assert_eq!(world.spring_count(), 0);
}

#[test]
fn test_callback_can_disturb_from_static_event() {
    let mut world = PhysicsWorld::new(flat_config());
    world.register_callback(EventKind::WorldStatic, |_, commands| commands.disturb());
    let ball = world.add_sphere(0.5);

    world.update(1.0 / 60.0, 1, &[ball]);

    assert!(!world.at_rest());
}

#[test]
fn test_collinear_pocket_swallows_nothing() {
    let mut world = PhysicsWorld::with_sink(WorldConfig::default(), EventLog::new());
    world.add_plane(floor());
    world.add_bounded_plane(Triangle::new(
        Vec3::new(-1.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
    ));
    let ball = world.add_sphere(0.1);
    world.set_vector(ball, BodyVector::Position, Vec3::new(3.0, 3.0, 0.5));

    for _ in 0..60 {
        world.simulate(1.0 / 60.0);
    }

    assert_eq!(world.sink().count(EventKind::SphereVsPocket), 0);
    assert!(world.sink().count(EventKind::SphereVsPlane) > 0);
}

#[test]
fn test_oblique_fast_hit_transfers_full_impulse() {
    let mut world = PhysicsWorld::with_sink(
        WorldConfig {
            min_substep: 1.0,
            ..flat_config()
        },
        EventLog::new(),
    );
    let cue = world.add_sphere(0.5);
    let object = world.add_sphere(0.5);
    for id in [cue, object] {
        world.set_scalar(id, BodyScalar::LinearDamping, 0.0);
    }
    world.set_vector(object, BodyVector::Position, Vec3::new(2.0, 0.8, 0.0));
    world.set_vector(cue, BodyVector::Velocity, Vec3::new(4.0, 0.0, 0.0));

    world.simulate(1.0);

    // Impact normal (-0.6, -0.8), approach speed 2.4, e = 0.8.
    let vb = world.get_vector(object, BodyVector::Velocity);
    assert!((vb.magnitude() - 2.16).abs() < 1e-9, "vb = {:?}", vb);
    assert!((vb.x - 1.296).abs() < 1e-9 && (vb.y - 1.728).abs() < 1e-9);
    let va = world.get_vector(cue, BodyVector::Velocity);
    assert!((va.x - 2.704).abs() < 1e-9 && (va.y + 1.728).abs() < 1e-9, "va = {:?}", va);
    assert_eq!(world.sink().count(EventKind::SphereVsSphere), 1);
}
