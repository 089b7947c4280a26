//! System prompt templates for the prompt optimizer.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptTemplate {
    /// Rewrite the input as a structured role prompt.
    #[default]
    System,
    /// Turn a vague user request into a precise one.
    User,
    /// Chain-of-thought prompt generation.
    Expand,
    /// Divergent thinking: explore the topic from many angles.
    Iterate,
}

impl PromptTemplate {
    pub const ALL: [PromptTemplate; 4] = [
        PromptTemplate::System,
        PromptTemplate::User,
        PromptTemplate::Expand,
        PromptTemplate::Iterate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PromptTemplate::System => "system",
            PromptTemplate::User => "user",
            PromptTemplate::Expand => "expand",
            PromptTemplate::Iterate => "iterate",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn title(&self) -> &'static str {
        match self {
            PromptTemplate::System => "System prompt template",
            PromptTemplate::User => "User prompt refinement",
            PromptTemplate::Expand => "Chain-of-thought template",
            PromptTemplate::Iterate => "Divergent thinking template",
        }
    }

    /// The system prompt sent with every request while this template is active.
    pub fn system_prompt(&self) -> &'static str {
        match self {
            PromptTemplate::System => SYSTEM_TEMPLATE,
            PromptTemplate::User => USER_TEMPLATE,
            PromptTemplate::Expand => EXPAND_TEMPLATE,
            PromptTemplate::Iterate => ITERATE_TEMPLATE,
        }
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const SYSTEM_TEMPLATE: &str = "\
You are an expert in writing prompts for AI models. Optimize the prompt I give you \
and answer in this format:

# Role: [role name]

## Profile
- language: [language]
- description: [detailed description of the role]
- background: [background of the role]
- personality: [personality traits]
- expertise: [areas of expertise]
- target_audience: [intended users]

## Skills
1. [core skill category]
   - [specific skill]: [short description]
2. [supporting skill category]
   - [specific skill]: [short description]

## Rules
1. [basic principles]
2. [behaviour guidelines]
3. [constraints]

## Workflows
- Goal: [what the role must achieve]
- Step 1: [...]
- Step 2: [...]
- Expected result: [...]

## Initialization
As [role name], you must follow the Rules above and carry out tasks according to the Workflows.

Output only the optimized prompt, without any extra explanation.";

const USER_TEMPLATE: &str = "\
You are an expert in writing prompts for AI models. Rewrite the user prompt I give you \
so that it is precise and specific.

# Role: User prompt refinement specialist

## Background
- User prompts are often too broad and lack the details a model needs.
- Vague prompts produce generic, unfocused answers.

## Rules
1. Keep the original intent; never change what the user is asking for.
2. Add concrete goals, scope, audience and output format where they are missing.
3. Replace ambiguous words with measurable requirements.
4. Keep the result concise and directly usable.

## Workflow
1. Identify the core intent of the prompt.
2. List the information that is missing or ambiguous.
3. Fill the gaps with reasonable, explicit assumptions.
4. Produce the refined prompt.

Output only the refined prompt, without any extra explanation.";

const EXPAND_TEMPLATE: &str = "\
You are an expert in writing prompts for AI models. Turn the prompt I give you into a \
chain-of-thought prompt.

# Role: Chain-of-thought prompt specialist

## Background
- Plain prompts ask only for a result and skip the reasoning.
- Asking the model to think step by step makes answers more reliable.

## Rules
1. Break the problem into clear, ordered steps.
2. Ask for the reasoning of every step before the final answer.
3. Include a check of the result against the original question.

## Output format
1. Restate the problem.
2. Let's think step by step: [steps]
3. Final answer: [answer]

Output only the new prompt, without any extra explanation.";

const ITERATE_TEMPLATE: &str = "\
You are an expert in divergent thinking. Expand the prompt or topic I give you.

## Role: Divergent thinking specialist

## Background
- Good ideas often come from looking at a problem from unusual angles.

## Rules
1. Explore the topic from at least five different perspectives.
2. Include cross-domain analogies, reversed assumptions and extreme cases.
3. For every idea, give one concrete way to apply it.

## Output format
- Perspective: [name]
  - Idea: [...]
  - Application: [...]

Finish with the three most promising ideas and why they stand out.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_round_trips_every_template() {
        for template in PromptTemplate::ALL {
            assert_eq!(PromptTemplate::from_name(template.name()), Some(template));
            assert!(!template.system_prompt().is_empty());
        }
        assert_eq!(PromptTemplate::from_name(" EXPAND "), Some(PromptTemplate::Expand));
        assert_eq!(PromptTemplate::from_name("poem"), None);
    }

    #[test]
    fn test_default_is_system() {
        assert_eq!(PromptTemplate::default(), PromptTemplate::System);
    }
}
