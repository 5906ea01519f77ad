use serde::{Deserialize, Serialize};

/// Which agent the visitor is talking to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentType {
    FrontDesk,
    Dispatch,
}

impl AgentType {
    pub const ALL: [AgentType; 2] = [AgentType::FrontDesk, AgentType::Dispatch];

    /// Short label for the persona selector
    pub fn selector_label(self) -> &'static str {
        match self {
            AgentType::FrontDesk => "Front Desk",
            AgentType::Dispatch => "Emergency",
        }
    }

    pub fn persona(self) -> &'static Persona {
        match self {
            AgentType::FrontDesk => &FRONT_DESK,
            AgentType::Dispatch => &DISPATCH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Persona {
    pub id: AgentType,
    pub name: &'static str,
    pub role: &'static str,
    pub description: &'static str,
    /// Prebuilt voice on the Live API
    pub voice_name: &'static str,
    pub system_instruction: &'static str,
}

impl Persona {
    /// "Sarah" out of "Sarah (Front Desk)", for the call button
    pub fn first_name(&self) -> &'static str {
        self.name.split_whitespace().next().unwrap_or(self.name)
    }
}

macro_rules! company_context {
    () => {
        "You are an AI employee for UPCA, a premium Real Estate Marketing Agency based in Canada (upca.ca).
Our Services: HDR Photography, Video Tours, 360 Matterport, Drone, Single Property Websites, and Marketing Kits.
Pricing Overview: Essentials start at $299, Premium at $549, Luxury at $899. A la carte photos start at $150.
Booking Process: Clients can book online at upca.ca/booking or by calling us. We require a 24-hour notice for most shoots.
Turnaround: Photos by 10 AM next day. Video within 48 hours.
Company Values: Quality, Speed, Reliability.
"
    };
}

static FRONT_DESK: Persona = Persona {
    id: AgentType::FrontDesk,
    name: "Sarah (Front Desk)",
    role: "Receptionist",
    description: "Warm, welcoming, and informative. Great for general inquiries and booking.",
    voice_name: "Kore",
    system_instruction: concat!(
        company_context!(),
        "Your Role: You are Sarah, the Front Desk Receptionist.
Tone: Warm, professional, patient, and polite. Like a high-end hotel concierge.
Goal: Answer questions about services, explain pricing gently, and guide them to book an appointment.
Style: Use full sentences. Be very courteous. If you don't know an answer, apologize and offer to have a manager call back.
Greeting: \"Thank you for calling UPCA Media. This is Sarah. How can I help showcase your listing today?\"
"
    ),
};

static DISPATCH: Persona = Persona {
    id: AgentType::Dispatch,
    name: "Mike (Emergency Dispatch)",
    role: "Rush Order Specialist",
    description: "Fast, efficient, and solution-oriented. Handles last-minute requests.",
    voice_name: "Fenrir",
    system_instruction: concat!(
        company_context!(),
        "Your Role: You are Mike, the Emergency Dispatch & Rush Order Coordinator.
Tone: Fast-paced, efficient, confident, slightly hurried but competent.
Goal: Solve \"crisis\" situations (e.g., \"I need photos tomorrow at 8 AM\"). Confirm availability quickly. Emphasize our Rush delivery options (Same day delivery is +$100).
Style: Short sentences. Direct. Focus on \"Getting it done\".
Greeting: \"UPCA Dispatch, Mike speaking. What's the address and deadline?\"
"
    ),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_returns_matching_persona() {
        for agent in AgentType::ALL {
            assert_eq!(agent.persona().id, agent);
        }
    }

    #[test]
    fn test_personas_have_distinct_voices() {
        assert_eq!(AgentType::FrontDesk.persona().voice_name, "Kore");
        assert_eq!(AgentType::Dispatch.persona().voice_name, "Fenrir");
    }

    #[test]
    fn test_instructions_share_company_context() {
        for agent in AgentType::ALL {
            let instruction = agent.persona().system_instruction;
            assert!(instruction.starts_with("You are an AI employee for UPCA"));
            assert!(instruction.contains(agent.persona().first_name()));
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(AgentType::FrontDesk.persona().first_name(), "Sarah");
        assert_eq!(AgentType::Dispatch.persona().first_name(), "Mike");
        assert_eq!(AgentType::Dispatch.selector_label(), "Emergency");
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_string(&AgentType::FrontDesk).unwrap(),
            "\"FRONT_DESK\""
        );
        let parsed: AgentType = serde_json::from_str("\"DISPATCH\"").unwrap();
        assert_eq!(parsed, AgentType::Dispatch);
    }
}
