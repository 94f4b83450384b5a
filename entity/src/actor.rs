use serde::{Deserialize, Serialize};

/// Closed set of roles understood by both the remote engine and the local
/// evaluator. Wire keys are stable snake_case strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Doctor,
    Nurse,
    Patient,
    LabTechnician,
    Receptionist,
    BillingStaff,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Admin,
        Role::Doctor,
        Role::Nurse,
        Role::Patient,
        Role::LabTechnician,
        Role::Receptionist,
        Role::BillingStaff,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Nurse => "nurse",
            Role::Patient => "patient",
            Role::LabTechnician => "lab_technician",
            Role::Receptionist => "receptionist",
            Role::BillingStaff => "billing_staff",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Role::Admin),
            "doctor" => Some(Role::Doctor),
            "nurse" => Some(Role::Nurse),
            "patient" => Some(Role::Patient),
            "lab_technician" => Some(Role::LabTechnician),
            "receptionist" => Some(Role::Receptionist),
            "billing_staff" => Some(Role::BillingStaff),
            _ => None,
        }
    }

    /// Human-readable name, used when provisioning the remote engine.
    pub fn display_name(self) -> &'static str {
        match self {
            Role::Admin => "Administrator",
            Role::Doctor => "Doctor",
            Role::Nurse => "Nurse",
            Role::Patient => "Patient",
            Role::LabTechnician => "Lab Technician",
            Role::Receptionist => "Receptionist",
            Role::BillingStaff => "Billing Staff",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Role::Admin => "Full system access",
            Role::Doctor => "Medical staff with treatment privileges",
            Role::Nurse => "Medical staff with care privileges",
            Role::Patient => "Patient access to own records",
            Role::LabTechnician => "Laboratory staff",
            Role::Receptionist => "Front desk staff",
            Role::BillingStaff => "Finance department staff",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signed-in user. The first entry in `roles` is the primary role; policy
/// evaluation keys off it. Created at login or session restore, dropped at
/// logout, serialized whole into the session cookie in between.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub roles: Vec<Role>,
    #[serde(default)]
    pub department: Option<String>,
    pub tenant: String,
}

impl Actor {
    pub fn primary_role(&self) -> Option<Role> {
        self.roles.first().copied()
    }
}
