use entity::{Actor, Role};

/// Demo credential directory standing in for an identity provider: a login
/// is a straight email + password match against the fixture set. Passwords
/// are plaintext because these are published demo accounts.
pub struct UserDirectory {
    users: Vec<DirectoryUser>,
}

struct DirectoryUser {
    password: String,
    actor: Actor,
}

impl UserDirectory {
    pub fn with_sample_users(tenant: &str) -> Self {
        let entry = |id: &str,
                     email: &str,
                     password: &str,
                     display_name: &str,
                     roles: Vec<Role>,
                     department: Option<&str>| DirectoryUser {
            password: password.into(),
            actor: Actor {
                id: id.into(),
                display_name: display_name.into(),
                email: email.into(),
                roles,
                department: department.map(Into::into),
                tenant: tenant.into(),
            },
        };

        Self {
            users: vec![
                entry(
                    "admin-user",
                    "admin@medsecure.example",
                    "admin123",
                    "Admin User",
                    vec![Role::Admin],
                    Some("Administration"),
                ),
                entry(
                    "doctor-smith",
                    "dr.smith@medsecure.example",
                    "doctor123",
                    "John Smith",
                    vec![Role::Doctor],
                    Some("Cardiology"),
                ),
                entry(
                    "nurse-johnson",
                    "nurse.johnson@medsecure.example",
                    "nurse123",
                    "Sarah Johnson",
                    vec![Role::Nurse],
                    Some("Pediatrics"),
                ),
                entry(
                    "pt-001",
                    "patient.doe@medsecure.example",
                    "patient123",
                    "John Doe",
                    vec![Role::Patient],
                    None,
                ),
            ],
        }
    }

    pub fn authenticate(&self, email: &str, password: &str) -> Option<Actor> {
        self.users
            .iter()
            .find(|user| user.actor.email == email && user.password == password)
            .map(|user| user.actor.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_credentials_resolve_to_actor() {
        let directory = UserDirectory::with_sample_users("hospital_central");
        let actor = directory
            .authenticate("dr.smith@medsecure.example", "doctor123")
            .unwrap();
        assert_eq!(actor.id, "doctor-smith");
        assert_eq!(actor.primary_role(), Some(Role::Doctor));
        assert_eq!(actor.tenant, "hospital_central");
    }

    #[test]
    fn wrong_password_is_rejected() {
        let directory = UserDirectory::with_sample_users("hospital_central");
        assert!(
            directory
                .authenticate("dr.smith@medsecure.example", "nope")
                .is_none()
        );
    }
}
