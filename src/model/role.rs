#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Role {
    Admin = 1,
    Coordinator = 2,
    Volunteer = 3,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Coordinator),
            3 => Some(Role::Volunteer),
            _ => None,
        }
    }

    /// Admins and coordinators run the org; volunteers are self-service only.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Coordinator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_id() {
        assert_eq!(Role::from_id(1), Some(Role::Admin));
        assert_eq!(Role::from_id(2), Some(Role::Coordinator));
        assert_eq!(Role::from_id(3), Some(Role::Volunteer));
        assert_eq!(Role::from_id(0), None);
        assert_eq!(Role::from_id(9), None);
    }

    #[test]
    fn test_staff() {
        assert!(Role::Admin.is_staff());
        assert!(Role::Coordinator.is_staff());
        assert!(!Role::Volunteer.is_staff());
    }
}
