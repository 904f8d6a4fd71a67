use log::warn;

use tern_shared::WeaponState;

use crate::components::{WeaponEntry, WeaponStates, WEAPON_STATES};
use crate::translator::IngressCtx;

/// Ingress of per-turret state. Each instance updates its own entry; the
/// other instances of the same entity are left untouched.
pub(crate) struct WeaponTranslator;

impl WeaponTranslator {
    pub fn apply(ctx: &mut IngressCtx, weapon: &WeaponState) {
        let Some(entity) = ctx.ids.entity(weapon.network_id) else {
            return;
        };

        if ctx
            .world
            .get_managed::<WeaponStates>(entity, WEAPON_STATES)
            .is_none()
        {
            if let Err(error) = ctx
                .world
                .add_managed(entity, WEAPON_STATES, WeaponStates::default())
            {
                warn!("weapon state for {} dropped: {}", weapon.network_id, error);
                return;
            }
        }
        let states = ctx
            .world
            .get_managed_mut::<WeaponStates>(entity, WEAPON_STATES)
            .expect("just ensured presence");
        states.weapons.insert(
            weapon.instance_id,
            WeaponEntry {
                status: weapon.status,
                azimuth: weapon.azimuth,
                elevation: weapon.elevation,
                ammo: weapon.ammo,
            },
        );
    }
}
