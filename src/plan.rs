//! Text rendering of a skill plan tree

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan
{   pub description: String
  , #[serde(default)]
    pub skill_name: String
  , #[serde(default)]
    pub name: String
  , #[serde(default)]
    pub parameters: Vec<(String, String)>
  , #[serde(default)]
    pub outputs: Vec<String>
  , #[serde(default)]
    pub steps: Vec<Plan>
}

impl Plan
{   pub fn to_plan_string(&self) -> String
    {   to_plan_string(self, " ")
    }
}

/// Render a goal header and one line per leaf step.
/// Nested plans recurse with the indent doubled.
pub fn to_plan_string(plan: &Plan, indent: &str) -> String
{   let header = format!(
      "{indent}Goal: {}\n\n{indent}Steps:\n", plan.description
    );
    let steps: Vec<String> = plan.steps.iter()
      .map(|step| {
        if !step.steps.is_empty()
        {   return to_plan_string(step, &indent.repeat(2));
        }
        let mut line = format!(
          "{indent}{indent}- {}.{}", step.skill_name, step.name
        );
        let params: Vec<String> = step.parameters.iter()
          .map(|(key, value)| format!("{}='{}'", key, value))
          .collect();
        if !params.is_empty()
        {   line.push(' ');
            line.push_str(&params.join(" "));
        }
        if let Some(output) = step.outputs.first()
          .filter(|o| !o.is_empty())
        {   line.push_str(" => ");
            line.push_str(output);
        }
        line
      })
      .collect();
    header + &steps.join("\n")
}
