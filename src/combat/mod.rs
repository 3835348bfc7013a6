//! Combat resolution: direct fire and area damage
//!
//! Direct fire greedily spends the tick's seconds on the highest
//! damage-per-second attacker/target sub-entity pairing, destroying targets
//! outright when the remaining time affords it. Area damage fires blind.

use std::sync::Arc;

use crate::core::error::Result;
use crate::core::types::{Handle, Vec2};
use crate::entity::agent::{EntityTypeData, SimAgent};
use crate::entity::weapons::{best_weapon, Weapon};
use crate::world::WorldState;

/// Floor for "damage needed to destroy" so floating-point zeroes can never
/// stall the fire loop.
pub const MIN_DAMAGE_NEEDED: f64 = 1e-6;

/// Tolerance when matching an observation against the current clock.
const OBSERVATION_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
struct AttackerBlock {
    shooters: u32,
    type_data: Arc<EntityTypeData>,
}

/// One tick of direct fire from `attacker` onto `target` over `dt` seconds.
///
/// Firing requires that the attacker's team observed the target's position
/// at the current simulated timestamp; stale observations block fire.
/// Returns whether anything was hit.
pub fn direct_fire(
    world: &mut WorldState,
    attacker: Handle<SimAgent>,
    target: Handle<SimAgent>,
    dt: f64,
) -> Result<bool> {
    let (attacker_team, attacker_pos, blocks) = {
        let a = world.get(attacker)?;
        if !a.is_active() || !a.can_fire() {
            return Ok(false);
        }
        let blocks: Vec<AttackerBlock> = a
            .entities
            .iter()
            .filter(|e| e.can_fire())
            .map(|e| AttackerBlock {
                shooters: e.active_count(),
                type_data: Arc::clone(&e.type_data),
            })
            .filter(|b| b.shooters > 0)
            .collect();
        (a.team, a.position, blocks)
    };
    if blocks.is_empty() {
        return Ok(false);
    }

    let now = world.elapsed();
    let distance = {
        let t = world.get(target)?;
        let observed = t
            .observation_by(attacker_team)
            .map(|obs| (now - obs.observed_at).abs() <= OBSERVATION_EPSILON)
            .unwrap_or(false);
        if !observed || !t.is_active() {
            return Ok(false);
        }
        attacker_pos.distance(&t.position)
    };

    let mut remaining = dt;
    let mut hit_anything = false;

    while remaining > 0.0 {
        // Best achievable pairing right now: attacker block x target block
        // with the highest total damage-per-second.
        let pairing = {
            let t = world.get(target)?;
            let mut best: Option<(usize, f64)> = None;
            for block in &blocks {
                for (target_idx, target_block) in t.entities.iter().enumerate() {
                    if !target_block.is_active() {
                        continue;
                    }
                    let Some((_, dps)) =
                        best_weapon(&block.type_data.weapons, distance, target_block.type_data.class)
                    else {
                        continue;
                    };
                    let total = dps * block.shooters as f64;
                    match best {
                        Some((_, best_dps)) if total <= best_dps => {}
                        _ => best = Some((target_idx, total)),
                    }
                }
            }
            best
        };

        let Some((target_idx, total_dps)) = pairing else {
            break;
        };

        let t = world.get_mut(target)?;
        let needed = t.entities[target_idx]
            .remaining_health()
            .max(MIN_DAMAGE_NEEDED);
        let time_to_destroy = needed / total_dps;

        if time_to_destroy <= remaining {
            t.entities[target_idx].apply_damage(needed);
            remaining -= time_to_destroy;
            hit_anything = true;
            tracing::trace!(
                target = %t.name,
                block = target_idx,
                "sub-entity destroyed by direct fire"
            );
        } else {
            t.entities[target_idx].apply_damage(total_dps * remaining);
            remaining = 0.0;
            hit_anything = true;
        }
    }

    Ok(hit_anything)
}

/// Blast damage around `center`: every agent within `radius` takes
/// `dps(targetClass) * num_shooters * dt`, distributed proportionally to
/// its active sub-entity counts. No range or observation gating - area
/// weapons fire blind, friendly fire included.
pub fn area_damage(
    world: &mut WorldState,
    center: Vec2,
    radius: f64,
    weapon: &Weapon,
    num_shooters: u32,
    dt: f64,
) -> Result<u32> {
    if num_shooters == 0 || dt <= 0.0 {
        return Ok(0);
    }

    let victims: Vec<Handle<SimAgent>> = world
        .agents()
        .filter(|a| a.is_active() && a.position.distance(&center) <= radius)
        .map(SimAgent::handle)
        .collect();

    let mut agents_hit = 0;
    for handle in victims {
        let agent = world.get_mut(handle)?;
        let total_active: u32 = agent.entities.iter().map(|e| e.active_count()).sum();
        if total_active == 0 {
            continue;
        }
        let mut any = false;
        for entity in &mut agent.entities {
            let active = entity.active_count();
            if active == 0 {
                continue;
            }
            let dps = weapon.dps_against(entity.type_data.class);
            if dps <= 0.0 {
                continue;
            }
            let share = active as f64 / total_active as f64;
            entity.apply_damage(dps * num_shooters as f64 * dt * share);
            any = true;
        }
        if any {
            agents_hit += 1;
        }
    }
    Ok(agents_hit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Rect, Team};
    use crate::entity::agent::{EntityTypeData, SimEntity};
    use crate::entity::weapons::UnitClass;

    fn armed_type(dps: f64, max_range: f64) -> Arc<EntityTypeData> {
        Arc::new(EntityTypeData {
            name: "rifles".into(),
            class: UnitClass::Infantry,
            max_health_per_unit: 10.0,
            speed: 5.0,
            weapons: vec![Weapon::new("rifle", 0.0, max_range).with_dps(UnitClass::Infantry, dps)],
        })
    }

    fn unarmed_type(health: f64) -> Arc<EntityTypeData> {
        Arc::new(EntityTypeData {
            name: "trucks".into(),
            class: UnitClass::Infantry,
            max_health_per_unit: health,
            speed: 20.0,
            weapons: vec![],
        })
    }

    fn two_agent_world(range: f64, separation: f64, dps: f64) -> (WorldState, Handle<SimAgent>, Handle<SimAgent>) {
        let mut w = WorldState::new(Rect::default(), Team::Red, Some(7));
        let red = w
            .add(
                SimAgent::new("red", Team::Red, Vec2::ZERO)
                    .with_visual_range(50.0)
                    .with_entity(SimEntity::new(1, armed_type(dps, range))),
            )
            .unwrap();
        let blue = w
            .add(
                SimAgent::new("blue", Team::Blue, Vec2::new(separation, 0.0))
                    .with_visual_range(50.0)
                    .with_entity(SimEntity::new(1, unarmed_type(10.0))),
            )
            .unwrap();
        (w, red, blue)
    }

    #[test]
    fn test_fire_requires_current_observation() {
        let (mut w, red, blue) = two_agent_world(2.0, 1.5, 5.0);
        // No step yet: no observation, so no fire.
        assert!(!direct_fire(&mut w, red, blue, 10.0).unwrap());

        w.step(1.0).unwrap();
        let dt = w.since_last_step();
        assert!(direct_fire(&mut w, red, blue, dt).unwrap());
    }

    #[test]
    fn test_stale_observation_blocks_fire() {
        let (mut w, red, blue) = two_agent_world(2.0, 1.5, 5.0);
        w.step(1.0).unwrap();
        // Blue slips out of visual range; the next tick leaves the old
        // observation stale relative to the new clock.
        w.get_mut(blue).unwrap().position = Vec2::new(100.0, 0.0);
        w.step(1.0).unwrap();
        assert!(!direct_fire(&mut w, red, blue, 1.0).unwrap());
    }

    #[test]
    fn test_lethal_burst_destroys_target() {
        let (mut w, red, blue) = two_agent_world(2.0, 1.5, 5.0);
        w.step(1.0).unwrap();
        // dps * 10s = 50 >= 10 max health: single tick resolves the target.
        assert!(direct_fire(&mut w, red, blue, 10.0).unwrap());
        assert!(!w.get(blue).unwrap().is_active());
    }

    #[test]
    fn test_energy_conservation() {
        let (mut w, red, blue) = two_agent_world(2.0, 1.5, 4.0);
        w.step(1.0).unwrap();
        let dt = 1.5;
        direct_fire(&mut w, red, blue, dt).unwrap();
        let dealt = w.get(blue).unwrap().entities[0].damage;
        assert!(dealt <= 4.0 * dt + 1e-9);
        assert!(dealt > 0.0);
    }

    #[test]
    fn test_out_of_range_no_fire() {
        let (mut w, red, blue) = two_agent_world(2.0, 30.0, 5.0);
        w.step(1.0).unwrap();
        assert!(!direct_fire(&mut w, red, blue, 5.0).unwrap());
        assert_eq!(w.get(blue).unwrap().entities[0].damage, 0.0);
    }

    #[test]
    fn test_greedy_retargeting_across_blocks() {
        let mut w = WorldState::new(Rect::default(), Team::Red, Some(7));
        let red = w
            .add(
                SimAgent::new("red", Team::Red, Vec2::ZERO)
                    .with_visual_range(50.0)
                    .with_entity(SimEntity::new(2, armed_type(10.0, 5.0))),
            )
            .unwrap();
        let blue = w
            .add(
                SimAgent::new("blue", Team::Blue, Vec2::new(1.0, 0.0))
                    .with_visual_range(50.0)
                    .with_entity(SimEntity::new(1, unarmed_type(10.0)))
                    .with_entity(SimEntity::new(1, unarmed_type(10.0))),
            )
            .unwrap();
        w.step(1.0).unwrap();

        // 2 shooters x 10 dps = 20 dps; 1 second kills one 10-health block
        // in 0.5s and then moves on to the next.
        assert!(direct_fire(&mut w, red, blue, 1.0).unwrap());
        let t = w.get(blue).unwrap();
        assert!(!t.entities[0].is_active());
        assert!((t.entities[1].damage - 10.0).abs() < 1e-6);
        assert!(!t.is_active());
    }

    #[test]
    fn test_area_damage_is_blind_and_proportional() {
        let mut w = WorldState::new(Rect::default(), Team::Red, Some(7));
        // Never observed by anyone: area fire does not care.
        let blue = w
            .add(
                SimAgent::new("blue", Team::Blue, Vec2::new(1.0, 0.0))
                    .with_entity(SimEntity::new(3, unarmed_type(10.0)))
                    .with_entity(SimEntity::new(1, unarmed_type(10.0))),
            )
            .unwrap();
        let far = w
            .add(
                SimAgent::new("far", Team::Blue, Vec2::new(100.0, 0.0))
                    .with_entity(SimEntity::new(1, unarmed_type(10.0))),
            )
            .unwrap();

        let shell = Weapon::new("shell", 0.0, 50.0)
            .with_splash(5.0)
            .with_dps(UnitClass::Infantry, 8.0);
        let hit = area_damage(&mut w, Vec2::ZERO, 5.0, &shell, 2, 1.0).unwrap();
        assert_eq!(hit, 1);

        let t = w.get(blue).unwrap();
        // 8 dps * 2 shooters * 1s = 16, split 3:1 across blocks.
        assert!((t.entities[0].damage - 12.0).abs() < 1e-9);
        assert!((t.entities[1].damage - 4.0).abs() < 1e-9);
        assert_eq!(w.get(far).unwrap().entities[0].damage, 0.0);
    }

    #[test]
    fn test_area_damage_hits_friends_too() {
        let mut w = WorldState::new(Rect::default(), Team::Red, Some(7));
        let red = w
            .add(
                SimAgent::new("red", Team::Red, Vec2::ZERO)
                    .with_entity(SimEntity::new(1, unarmed_type(10.0))),
            )
            .unwrap();
        let shell = Weapon::new("shell", 0.0, 50.0)
            .with_splash(5.0)
            .with_dps(UnitClass::Infantry, 4.0);
        area_damage(&mut w, Vec2::ZERO, 5.0, &shell, 1, 1.0).unwrap();
        assert!(w.get(red).unwrap().entities[0].damage > 0.0);
    }
}
