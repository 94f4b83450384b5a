use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of resource types the policy model covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Patient,
    MedicalRecord,
    Prescription,
    Billing,
    LabResult,
    Appointment,
    Schedule,
    System,
}

impl ResourceType {
    pub const ALL: [ResourceType; 8] = [
        ResourceType::Patient,
        ResourceType::MedicalRecord,
        ResourceType::Prescription,
        ResourceType::Billing,
        ResourceType::LabResult,
        ResourceType::Appointment,
        ResourceType::Schedule,
        ResourceType::System,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Patient => "patient",
            ResourceType::MedicalRecord => "medical_record",
            ResourceType::Prescription => "prescription",
            ResourceType::Billing => "billing",
            ResourceType::LabResult => "lab_result",
            ResourceType::Appointment => "appointment",
            ResourceType::Schedule => "schedule",
            ResourceType::System => "system",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "patient" => Some(ResourceType::Patient),
            "medical_record" => Some(ResourceType::MedicalRecord),
            "prescription" => Some(ResourceType::Prescription),
            "billing" => Some(ResourceType::Billing),
            "lab_result" => Some(ResourceType::LabResult),
            "appointment" => Some(ResourceType::Appointment),
            "schedule" => Some(ResourceType::Schedule),
            "system" => Some(ResourceType::System),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ResourceType::Patient => "Patient",
            ResourceType::MedicalRecord => "Medical Record",
            ResourceType::Prescription => "Prescription",
            ResourceType::Billing => "Billing",
            ResourceType::LabResult => "Lab Result",
            ResourceType::Appointment => "Appointment",
            ResourceType::Schedule => "Schedule",
            ResourceType::System => "System",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ResourceType::Patient => "Patient records",
            ResourceType::MedicalRecord => "Medical records",
            ResourceType::Prescription => "Prescription data",
            ResourceType::Billing => "Billing information",
            ResourceType::LabResult => "Laboratory test results",
            ResourceType::Appointment => "Patient appointments",
            ResourceType::Schedule => "Staff schedules",
            ResourceType::System => "System settings",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of actions the policy model covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
    Approve,
    Administer,
    Manage,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::View,
        Action::Create,
        Action::Edit,
        Action::Delete,
        Action::Approve,
        Action::Administer,
        Action::Manage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Approve => "approve",
            Action::Administer => "administer",
            Action::Manage => "manage",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "view" => Some(Action::View),
            "create" => Some(Action::Create),
            "edit" => Some(Action::Edit),
            "delete" => Some(Action::Delete),
            "approve" => Some(Action::Approve),
            "administer" => Some(Action::Administer),
            "manage" => Some(Action::Manage),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Action::View => "View",
            Action::Create => "Create",
            Action::Edit => "Edit",
            Action::Delete => "Delete",
            Action::Approve => "Approve",
            Action::Administer => "Administer",
            Action::Manage => "Manage",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open attribute bag attached to a resource instance (owning patient id,
/// department, tenant, ...). Only ever inspected during ABAC evaluation.
pub type Attributes = serde_json::Map<String, Value>;

/// A reference to one resource instance: the type tag plus its attributes.
/// Never persisted by the authorization core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl ResourceRef {
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            attributes: Attributes::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}
