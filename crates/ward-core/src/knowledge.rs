//! Bundled hospital knowledge base with keyword retrieval.
//!
//! The assistant grounds its replies in a small curated set of hospital and
//! self-care entries. Retrieval is a plain token-overlap ranking; entries are
//! returned as opaque text for the prompt builder to prepend. Emergency
//! detection is a separate keyword scan over the raw query.

/// One retrievable knowledge entry.
#[derive(Debug, Clone, Copy)]
pub struct KnowledgeEntry {
    pub text: &'static str,
    pub category: &'static str,
}

/// Curated knowledge for Riverton General Hospital.
pub const KNOWLEDGE: &[KnowledgeEntry] = &[
    // Hospital information
    KnowledgeEntry {
        text: "Riverton General Hospital is located at 14 Harbor Street, Riverton. \
               We provide comprehensive healthcare services including emergency care, \
               general medicine, surgery, pediatrics, gynecology, and specialized treatments.",
        category: "hospital_info",
    },
    KnowledgeEntry {
        text: "Riverton General Hospital emergency services are available 24/7. For \
               emergencies, call 911 or visit our emergency department immediately. Our \
               emergency team is equipped to handle all types of medical emergencies.",
        category: "emergency",
    },
    KnowledgeEntry {
        text: "To book an appointment at Riverton General Hospital, you can call our \
               reception or use our online booking system. We have specialists available \
               for cardiology, neurology, orthopedics, dermatology, and internal medicine.",
        category: "appointments",
    },
    // Common health issues
    KnowledgeEntry {
        text: "For common cold symptoms like runny nose, sneezing, and mild cough: rest, \
               drink plenty of fluids, use saline nasal drops, and take over-the-counter \
               pain relievers if needed. If symptoms persist for more than 7 days or \
               worsen, consult a doctor.",
        category: "common_cold",
    },
    KnowledgeEntry {
        text: "For mild headaches: try rest in a quiet, dark room, apply a cold or warm \
               compress, stay hydrated, and take over-the-counter pain relievers like \
               acetaminophen or ibuprofen. If headaches are severe, frequent, or \
               accompanied by other symptoms, see a doctor.",
        category: "headache",
    },
    KnowledgeEntry {
        text: "For minor cuts and scrapes: clean the wound with water, apply antibiotic \
               ointment, cover with a bandage, and keep it clean and dry. Change the \
               bandage daily. Seek medical attention if signs of infection appear.",
        category: "minor_wounds",
    },
    KnowledgeEntry {
        text: "For mild stomach upset or indigestion: eat bland foods like rice, bananas, \
               toast. Avoid spicy, fatty, or acidic foods. Stay hydrated with clear \
               fluids. If symptoms persist for more than 24 hours or include severe pain, \
               see a doctor.",
        category: "stomach_upset",
    },
    KnowledgeEntry {
        text: "For mild fever (under 101F): rest, drink plenty of fluids, take \
               acetaminophen or ibuprofen as directed. Monitor temperature regularly. If \
               fever exceeds 103F, persists for more than 3 days, or is accompanied by \
               severe symptoms, seek medical attention.",
        category: "mild_fever",
    },
    KnowledgeEntry {
        text: "For minor allergic reactions (mild rash, itching): avoid the allergen, \
               apply cool compresses, use antihistamines. If symptoms worsen or include \
               difficulty breathing, seek immediate medical attention.",
        category: "mild_allergies",
    },
    // Serious conditions
    KnowledgeEntry {
        text: "SERIOUS: Chest pain, especially if accompanied by shortness of breath, \
               nausea, or pain radiating to the arm or jaw, requires immediate medical \
               attention. This could indicate a heart attack. Call emergency services \
               immediately.",
        category: "serious_chest_pain",
    },
    KnowledgeEntry {
        text: "SERIOUS: Severe abdominal pain, especially with sudden onset, vomiting, \
               fever, or inability to pass gas, requires immediate medical evaluation. \
               This could indicate appendicitis or other serious conditions.",
        category: "serious_abdominal_pain",
    },
    KnowledgeEntry {
        text: "SERIOUS: Difficulty breathing, wheezing, or shortness of breath requires \
               immediate medical attention. This could indicate asthma, pneumonia, or \
               other respiratory emergencies.",
        category: "breathing_difficulty",
    },
    KnowledgeEntry {
        text: "SERIOUS: High fever (over 103F), especially with stiff neck, severe \
               headache, rash, or confusion, requires immediate medical attention. This \
               could indicate meningitis or other serious infections.",
        category: "high_fever",
    },
    KnowledgeEntry {
        text: "SERIOUS: Severe allergic reactions (anaphylaxis) with difficulty \
               breathing, swelling of face or throat, rapid pulse, or dizziness require \
               immediate emergency treatment. Use an EpiPen if available and call 911.",
        category: "severe_allergic_reaction",
    },
    KnowledgeEntry {
        text: "SERIOUS: Any head injury with loss of consciousness, confusion, \
               persistent vomiting, or severe headache requires immediate medical \
               evaluation. Do not ignore head injuries.",
        category: "head_injury",
    },
    KnowledgeEntry {
        text: "SERIOUS: Signs of stroke including sudden weakness, numbness, confusion, \
               trouble speaking, or severe headache require immediate emergency \
               treatment. Time is critical - call 911 immediately.",
        category: "stroke_symptoms",
    },
    // Preventive care and departments
    KnowledgeEntry {
        text: "Regular health checkups at Riverton General Hospital include blood \
               pressure monitoring, cholesterol screening, diabetes screening, and \
               cancer screenings. We recommend annual checkups for adults and more \
               frequent visits for those with chronic conditions.",
        category: "preventive_care",
    },
    KnowledgeEntry {
        text: "Vaccination services at Riverton General Hospital include routine \
               immunizations for children and adults, flu shots, and travel vaccines. \
               Keep your vaccination records up to date.",
        category: "vaccinations",
    },
    KnowledgeEntry {
        text: "Our cardiology department specializes in heart conditions, high blood \
               pressure, chest pain evaluation, and cardiac procedures. Dr. Elena Voss \
               is our lead cardiologist.",
        category: "cardiology",
    },
    KnowledgeEntry {
        text: "Our orthopedic department handles bone fractures, joint problems, sports \
               injuries, and arthritis. Dr. Marcus Hale specializes in orthopedic \
               surgery and joint replacement.",
        category: "orthopedics",
    },
    KnowledgeEntry {
        text: "Our pediatrics department provides comprehensive care for children from \
               birth to 18 years. Dr. Priya Raman specializes in child health, growth \
               monitoring, and pediatric emergencies.",
        category: "pediatrics",
    },
    KnowledgeEntry {
        text: "Our gynecology department offers women's health services including \
               pregnancy care, reproductive health, and gynecological procedures. \
               Dr. Sofia Arendt is our senior gynecologist.",
        category: "gynecology",
    },
];

/// Queries matching any of these are treated as emergencies.
const EMERGENCY_KEYWORDS: &[&str] = &[
    "chest pain",
    "can't breathe",
    "cant breathe",
    "difficulty breathing",
    "severe pain",
    "bleeding heavily",
    "unconscious",
    "stroke",
    "heart attack",
    "severe allergic reaction",
    "anaphylaxis",
    "head injury",
    "high fever",
    "severe headache",
    "can't move",
    "emergency",
];

/// Whether the query indicates a medical emergency.
pub fn is_urgent(query: &str) -> bool {
    let lower = query.to_lowercase();
    EMERGENCY_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_string)
        .collect()
}

/// Rank knowledge entries by token overlap with the query and return the top
/// `top_k` texts. Entries with no overlap are never returned.
pub fn search_knowledge(query: &str, top_k: usize) -> Vec<&'static str> {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(usize, &KnowledgeEntry)> = KNOWLEDGE
        .iter()
        .map(|entry| {
            let entry_tokens = tokenize(entry.text);
            let score = query_tokens
                .iter()
                .filter(|t| entry_tokens.contains(t))
                .count();
            (score, entry)
        })
        .filter(|(score, _)| *score > 0)
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().take(top_k).map(|(_, e)| e.text).collect()
}
