// Property-based tests for job registration and the registry

use leadcron::errors::RegistrationError;
use leadcron::jobs::{self, JobSpec, RequestSpec};
use proptest::prelude::*;

fn unique_names() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::hash_set("[a-z][a-z0-9-]{0,15}", 1..8)
        .prop_map(|set| set.into_iter().collect())
}

proptest! {
    /// *For all* valid job configuration sets with unique names,
    /// registration succeeds and the validated set exposes exactly those
    /// names, in order.
    #[test]
    fn property_unique_valid_specs_always_register(names in unique_names()) {
        let specs: Vec<JobSpec> = names
            .iter()
            .map(|name| {
                JobSpec::new(name.clone(), "*/5 * * * * *", "UTC")
                    .request(RequestSpec::get("/test-url"))
            })
            .collect();

        let jobs = jobs::validate(&specs).unwrap();
        let job_names: Vec<&str> = jobs.iter().map(|j| j.name.as_str()).collect();
        let expected: Vec<&str> = names.iter().map(String::as_str).collect();
        prop_assert_eq!(job_names, expected);
    }

    /// *For any* valid set, repeating one of its names always fails with
    /// `DuplicateJobName` and yields no jobs at all.
    #[test]
    fn property_duplicate_name_always_rejected(
        names in unique_names(),
        pick in any::<prop::sample::Index>(),
    ) {
        let duplicated = names[pick.index(names.len())].clone();
        let mut specs: Vec<JobSpec> = names
            .iter()
            .map(|name| {
                JobSpec::new(name.clone(), "*/5 * * * * *", "UTC")
                    .request(RequestSpec::get("/test-url"))
            })
            .collect();
        specs.push(
            JobSpec::new(duplicated.clone(), "*/5 * * * * *", "UTC")
                .request(RequestSpec::get("/test-url")),
        );

        let err = jobs::validate(&specs).unwrap_err();
        let rejected_as_duplicate = matches!(
            err,
            RegistrationError::DuplicateJobName { name } if name == duplicated
        );
        prop_assert!(rejected_as_duplicate, "unexpected registration error");
    }

    /// *For any* otherwise valid spec, a garbage schedule string that is
    /// not a cron expression is always rejected as such.
    #[test]
    fn property_garbage_schedule_always_rejected(junk in "[a-z ]{1,20}") {
        prop_assume!(junk.split_whitespace().count() < 6);
        let spec = JobSpec::new("testcron", junk, "UTC")
            .request(RequestSpec::get("/test-url"));
        let err = jobs::validate(&[spec]).unwrap_err();
        let rejected_as_invalid =
            matches!(err, RegistrationError::InvalidScheduleExpression { .. });
        prop_assert!(rejected_as_invalid, "unexpected registration error");
    }
}
