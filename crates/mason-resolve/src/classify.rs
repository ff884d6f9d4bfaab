use std::path::Path;

use mason_core::ProjectProblem;

use crate::ResolverError;

/// Translate a resolver-boundary error into result-level problems.
///
/// Validation failures become one structure problem per structured message;
/// when no structured messages are available, a single problem is keyed off
/// the descriptor path and the root cause message. Any other error becomes
/// one generic structure problem, preferring a wrapped cause's message when
/// present.
pub fn classify(descriptor: &Path, error: &ResolverError) -> Vec<ProjectProblem> {
    match error {
        ResolverError::Validation { messages } if !messages.is_empty() => messages
            .iter()
            .map(|message| ProjectProblem::structure(descriptor, message.clone()))
            .collect(),
        ResolverError::Validation { .. } => {
            vec![ProjectProblem::structure(
                descriptor,
                error.to_string(),
            )]
        }
        ResolverError::Fatal { message, cause } => {
            let description = cause
                .as_ref()
                .map(|cause| cause.to_string())
                .unwrap_or_else(|| message.clone());
            vec![ProjectProblem::structure(descriptor, description)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mason_core::ProblemKind;

    #[test]
    fn validation_messages_become_one_problem_each() {
        let error = ResolverError::Validation {
            messages: vec!["missing groupId".to_string(), "bad version".to_string()],
        };
        let problems = classify(Path::new("/ws/pom.xml"), &error);
        assert_eq!(problems.len(), 2);
        assert!(problems.iter().all(|p| p.kind == ProblemKind::Structure));
        assert_eq!(problems[0].description, "missing groupId");
    }

    #[test]
    fn empty_validation_falls_back_to_descriptor_and_cause() {
        let error = ResolverError::Validation { messages: vec![] };
        let problems = classify(Path::new("/ws/pom.xml"), &error);
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].path, Path::new("/ws/pom.xml"));
    }

    #[test]
    fn fatal_prefers_wrapped_cause_message() {
        let cause: Box<dyn std::error::Error + Send + Sync> =
            "underlying io failure".to_string().into();
        let error = ResolverError::Fatal {
            message: "invocation failed".to_string(),
            cause: Some(cause),
        };
        let problems = classify(Path::new("/ws/pom.xml"), &error);
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].description, "underlying io failure");
    }
}
