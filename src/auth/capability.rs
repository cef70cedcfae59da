use crate::auth::auth::AuthUser;
use crate::errors::ApiError;
use crate::model::role::Role;

/// What the caller wants to do with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Approve,
    /// Administrative control: create/cancel shifts, membership changes,
    /// deactivation.
    Manage,
}

/// The target of a request, with just enough context to decide ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// A volunteer profile row.
    Volunteer { id: u64 },
    /// Attendance records owned by a volunteer.
    Attendance { owner: u64 },
    /// An hour ledger entry, optionally tied to a group.
    Ledger { owner: u64, group_id: Option<u64> },
    /// Shift catalog and management. Shifts have no owner.
    Shift,
    /// A group; `None` means "groups in general" (creation).
    Group { id: Option<u64> },
    /// Hour aggregation scoped by the given filters.
    Report {
        volunteer_id: Option<u64>,
        group_id: Option<u64>,
    },
}

/// The single permission gate, evaluated once per operation.
///
/// `group_admin_of` lists the group ids the actor administers; handlers fetch
/// it only when the resource can involve a group, so the decision itself
/// stays pure. Admins pass everything; coordinators everything except
/// admin-only management of volunteer accounts.
pub fn authorize(
    actor: &AuthUser,
    resource: &Resource,
    action: Action,
    group_admin_of: &[u64],
) -> Result<(), ApiError> {
    if allowed(actor, resource, action, group_admin_of) {
        Ok(())
    } else {
        Err(ApiError::not_authorized("not allowed"))
    }
}

fn allowed(actor: &AuthUser, resource: &Resource, action: Action, group_admin_of: &[u64]) -> bool {
    if actor.role == Role::Admin {
        return true;
    }
    let staff = actor.role.is_staff();

    match (resource, action) {
        (Resource::Volunteer { id }, Action::Read | Action::Update) => {
            staff || actor.is_self(*id)
        }
        (Resource::Volunteer { .. }, Action::Approve) => staff,
        // account deactivation stays admin-only
        (Resource::Volunteer { .. }, _) => false,

        // check-in is strictly self-service; check-out may be done by staff
        // on the volunteer's behalf
        (Resource::Attendance { owner }, Action::Create) => actor.is_self(*owner),
        (Resource::Attendance { owner }, Action::Read | Action::Update) => {
            staff || actor.is_self(*owner)
        }
        (Resource::Attendance { .. }, _) => false,

        (Resource::Ledger { owner, .. }, Action::Create) => actor.is_self(*owner),
        (Resource::Ledger { owner, group_id }, Action::Read) => {
            staff || actor.is_self(*owner) || is_group_admin(*group_id, group_admin_of)
        }
        (Resource::Ledger { group_id, .. }, Action::Approve) => {
            staff || is_group_admin(*group_id, group_admin_of)
        }
        (Resource::Ledger { .. }, _) => false,

        (Resource::Shift, Action::Read) => true,
        (Resource::Shift, _) => staff,

        (Resource::Group { .. }, Action::Read) => true,
        (Resource::Group { id }, Action::Manage) => {
            staff || id.map_or(false, |g| group_admin_of.contains(&g))
        }
        (Resource::Group { .. }, _) => false,

        (
            Resource::Report {
                volunteer_id,
                group_id,
            },
            Action::Read,
        ) => {
            staff
                || volunteer_id.is_some_and(|v| actor.is_self(v))
                || is_group_admin(*group_id, group_admin_of)
        }
        (Resource::Report { .. }, _) => false,
    }
}

fn is_group_admin(group_id: Option<u64>, group_admin_of: &[u64]) -> bool {
    group_id.is_some_and(|g| group_admin_of.contains(&g))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role, volunteer_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "t".into(),
            role,
            volunteer_id,
        }
    }

    #[test]
    fn test_admin_passes_everything() {
        let admin = actor(Role::Admin, None);
        for action in [
            Action::Read,
            Action::Create,
            Action::Update,
            Action::Approve,
            Action::Manage,
        ] {
            assert!(authorize(&admin, &Resource::Volunteer { id: 9 }, action, &[]).is_ok());
            assert!(authorize(&admin, &Resource::Shift, action, &[]).is_ok());
        }
    }

    #[test]
    fn test_coordinator_manages_shifts_but_not_accounts() {
        let coord = actor(Role::Coordinator, None);
        assert!(authorize(&coord, &Resource::Shift, Action::Manage, &[]).is_ok());
        assert!(authorize(&coord, &Resource::Volunteer { id: 9 }, Action::Approve, &[]).is_ok());
        // deactivation is Manage on a volunteer account: admin only
        assert!(authorize(&coord, &Resource::Volunteer { id: 9 }, Action::Manage, &[]).is_err());
    }

    #[test]
    fn test_volunteer_owns_their_records() {
        let vol = actor(Role::Volunteer, Some(3));
        assert!(authorize(&vol, &Resource::Attendance { owner: 3 }, Action::Create, &[]).is_ok());
        assert!(authorize(&vol, &Resource::Attendance { owner: 3 }, Action::Update, &[]).is_ok());
        assert!(authorize(&vol, &Resource::Attendance { owner: 4 }, Action::Read, &[]).is_err());
        assert!(authorize(&vol, &Resource::Attendance { owner: 4 }, Action::Update, &[]).is_err());
    }

    #[test]
    fn test_staff_checks_out_on_behalf_but_never_checks_in() {
        let coord = actor(Role::Coordinator, None);
        assert!(authorize(&coord, &Resource::Attendance { owner: 3 }, Action::Update, &[]).is_ok());
        assert!(authorize(&coord, &Resource::Attendance { owner: 3 }, Action::Create, &[]).is_err());
    }

    #[test]
    fn test_group_admin_approves_only_their_group() {
        let vol = actor(Role::Volunteer, Some(3));
        let entry = Resource::Ledger {
            owner: 8,
            group_id: Some(5),
        };
        assert!(authorize(&vol, &entry, Action::Approve, &[5]).is_ok());
        assert!(authorize(&vol, &entry, Action::Approve, &[6]).is_err());
        assert!(authorize(&vol, &entry, Action::Approve, &[]).is_err());

        // ungrouped entries are staff-only to approve
        let ungrouped = Resource::Ledger {
            owner: 8,
            group_id: None,
        };
        assert!(authorize(&vol, &ungrouped, Action::Approve, &[5]).is_err());
        assert!(authorize(&actor(Role::Coordinator, None), &ungrouped, Action::Approve, &[]).is_ok());
    }

    #[test]
    fn test_volunteer_never_approves_own_entries_without_group_admin() {
        let vol = actor(Role::Volunteer, Some(3));
        let own = Resource::Ledger {
            owner: 3,
            group_id: None,
        };
        assert!(authorize(&vol, &own, Action::Approve, &[]).is_err());
    }

    #[test]
    fn test_report_scoping() {
        let vol = actor(Role::Volunteer, Some(3));
        let own = Resource::Report {
            volunteer_id: Some(3),
            group_id: None,
        };
        let other = Resource::Report {
            volunteer_id: Some(4),
            group_id: None,
        };
        let group = Resource::Report {
            volunteer_id: None,
            group_id: Some(5),
        };
        assert!(authorize(&vol, &own, Action::Read, &[]).is_ok());
        assert!(authorize(&vol, &other, Action::Read, &[]).is_err());
        assert!(authorize(&vol, &group, Action::Read, &[]).is_err());
        assert!(authorize(&vol, &group, Action::Read, &[5]).is_ok());
        assert!(authorize(&actor(Role::Coordinator, None), &other, Action::Read, &[]).is_ok());
    }

    #[test]
    fn test_group_creation_is_staff_only() {
        let vol = actor(Role::Volunteer, Some(3));
        assert!(authorize(&vol, &Resource::Group { id: None }, Action::Manage, &[5]).is_err());
        assert!(
            authorize(&vol, &Resource::Group { id: Some(5) }, Action::Manage, &[5]).is_ok()
        );
        assert!(
            authorize(&actor(Role::Coordinator, None), &Resource::Group { id: None }, Action::Manage, &[])
                .is_ok()
        );
    }
}
