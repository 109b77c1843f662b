use super::PromptTemplate;
use chrono::Utc;

const BASIC: &str = "Basic analysis";
const DEEP: &str = "In-depth analysis";

/// (id, name, description, category, content)
const BUILT_IN: [(&str, &str, &str, &str, &str); 6] = [
    (
        "summary",
        "Paper summary",
        "Summarize the paper's core content",
        BASIC,
        "Summarize the core content of this paper, covering:\n\
         1. Research problem and background\n\
         2. Methods\n\
         3. Main findings\n\
         4. Contributions\n\n\
         Keep it to 300-500 words in an academic register.",
    ),
    (
        "methodology",
        "Research methods",
        "Analyze the methodology",
        BASIC,
        "Analyze the research methods used in this paper in detail:\n\
         1. Research design (experiment, observation, survey, ...)\n\
         2. Data sources and collection\n\
         3. Analysis techniques and tools\n\
         4. What is novel or distinctive about the methods\n\n\
         Present the answer in a structured way.",
    ),
    (
        "contributions",
        "Innovations and contributions",
        "Identify the paper's innovations",
        BASIC,
        "Identify the main innovations and academic contributions of this paper:\n\
         1. Theoretical innovation\n\
         2. Methodological innovation\n\
         3. Practical value\n\
         4. How it differs from existing work\n\n\
         Be explicit about what makes it unique and why it matters.",
    ),
    (
        "limitations",
        "Limitations and outlook",
        "Assess the study's limitations",
        BASIC,
        "Analyze the limitations of this paper and directions for future work:\n\
         1. Limitations (methods, data, theory, ...)\n\
         2. Possible improvements\n\
         3. Suggested follow-up research questions\n\
         4. Implications for practice\n\n\
         Keep the evaluation objective and balanced.",
    ),
    (
        "literature-review",
        "Literature review",
        "Summarize the literature review",
        DEEP,
        "Based on this paper, summarize its literature review:\n\
         1. Main theoretical frameworks cited\n\
         2. Key prior studies\n\
         3. Research gaps identified\n\
         4. Where this study positions itself\n\n\
         This should clarify the study's place in the field.",
    ),
    (
        "research-questions",
        "Research questions and hypotheses",
        "Identify the research questions",
        DEEP,
        "Extract the core research questions and hypotheses of this paper:\n\
         1. Main research questions\n\
         2. Hypotheses, if any\n\
         3. Theoretical basis\n\
         4. Why the questions matter\n\n\
         State them clearly.",
    ),
];

/// Fresh copies of the built-in templates.
pub fn default_templates() -> Vec<PromptTemplate> {
    let now = Utc::now();
    BUILT_IN
        .iter()
        .map(|(id, name, description, category, content)| PromptTemplate {
            id: id.to_string(),
            name: name.to_string(),
            content: content.to_string(),
            is_default: true,
            created_at: now,
            updated_at: now,
            description: Some(description.to_string()),
            category: Some(category.to_string()),
        })
        .collect()
}

pub fn is_default_id(id: &str) -> bool {
    BUILT_IN.iter().any(|(default_id, ..)| *default_id == id)
}
