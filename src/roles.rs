//! Built-in expert roles offered to clients.

use serde::Serialize;

/// A named expert persona the model can be asked to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RolePreset {
    /// Role name, inserted verbatim into the system prompt.
    pub name: &'static str,
    /// Short description for pickers.
    pub description: &'static str,
}

const ROLES: &[RolePreset] = &[
    RolePreset {
        name: "Technical Troubleshooter",
        description: "Diagnoses hardware, software and network problems",
    },
    RolePreset {
        name: "Medical Triage Nurse",
        description: "Assesses symptoms to decide urgency and next steps",
    },
    RolePreset {
        name: "Financial Advisor",
        description: "Narrows down budgeting, saving and investment options",
    },
    RolePreset {
        name: "Customer Support Agent",
        description: "Routes account, billing and product issues",
    },
    RolePreset {
        name: "Legal Intake Specialist",
        description: "Classifies a legal matter before referral",
    },
    RolePreset {
        name: "Automotive Mechanic",
        description: "Isolates the cause of vehicle faults",
    },
];

/// All built-in roles, in display order.
pub fn roles() -> &'static [RolePreset] {
    ROLES
}

/// Look up a built-in role by name, ignoring ASCII case.
pub fn find_role(name: &str) -> Option<&'static RolePreset> {
    ROLES.iter().find(|r| r.name.eq_ignore_ascii_case(name.trim()))
}
