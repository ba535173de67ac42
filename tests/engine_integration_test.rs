//! End-to-end tests of the pseudonymization engine through the public API

use chrono::NaiveDate;
use pseudo_service::core::factory::PseudoFuncsFactory;
use pseudo_service::core::metadata::FieldMetric;
use pseudo_service::core::service::{PseudoFieldRequest, PseudoService, RepseudoFieldRequest};
use pseudo_service::domain::{PseudoConfig, PseudoError, PseudoFuncRule, PseudoKeyset};
use pseudo_service::func::sid::InMemorySidIndex;
use pseudo_service::kms::{generate_keyset, AeadCache, LocalKekClient, KEY_LEN};
use serde_json::json;
use std::sync::Arc;
use test_case::test_case;

const KEK_URI: &str = "local-kek://test/main";
const FNR: &str = "11854898347";

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn factory() -> PseudoFuncsFactory {
    let client = LocalKekClient::new().with_kek(KEK_URI, [7u8; KEY_LEN]);
    PseudoFuncsFactory::new(Arc::new(AeadCache::with_defaults(Arc::new(client))))
}

fn sid_factory() -> PseudoFuncsFactory {
    let index = InMemorySidIndex::new()
        .with_mapping(date("2023-04-25"), FNR, "0001ha3")
        .with_mapping(date("2024-01-01"), FNR, "0002xy9");
    factory().with_sid_service(Arc::new(index))
}

fn keyset(factory: &PseudoFuncsFactory) -> PseudoKeyset {
    let kek = factory.aead_cache().get(KEK_URI).unwrap();
    generate_keyset(kek.as_ref(), KEK_URI).unwrap()
}

fn field_request(func: &str, keyset: Option<PseudoKeyset>, values: &[Option<&str>]) -> PseudoFieldRequest {
    PseudoFieldRequest {
        name: "fnr".to_string(),
        pattern: None,
        pseudo_func: func.to_string(),
        keyset,
        values: values.iter().map(|v| v.map(str::to_string)).collect(),
    }
}

#[test]
fn test_first_matching_rule_wins() {
    let service = PseudoService::new(Arc::new(factory()));
    let config = PseudoConfig::default()
        .with_rule(PseudoFuncRule::new("fnr", "**/fnr", "redact(placeholder=FNR)"))
        .with_rule(PseudoFuncRule::new("all", "**", "redact(placeholder=ANY)"))
        .with_rule(PseudoFuncRule::new("never", "**/fnr", "redact(placeholder=LATE)"));

    let response = service
        .pseudonymize_records(
            &[config],
            vec![json!({"person": {"fnr": "11854898347", "name": "Ola"}, "id": 7})],
        )
        .unwrap();

    assert_eq!(
        response.data[0],
        json!({"person": {"fnr": "FNR", "name": "ANY"}, "id": "ANY"})
    );
}

#[test]
fn test_unmatched_fields_pass_through() {
    let service = PseudoService::new(Arc::new(factory()));
    let config =
        PseudoConfig::default().with_rule(PseudoFuncRule::new("fnr", "/person/fnr", "redact"));
    let record = json!({"fnr": "top", "person": {"fnr": "x", "age": 42, "active": true}});

    let response = service.pseudonymize_records(&[config], vec![record]).unwrap();

    assert_eq!(
        response.data[0],
        json!({"fnr": "top", "person": {"fnr": "***", "age": 42, "active": true}})
    );
}

#[test]
fn test_function_sets_are_cached() {
    let factory = factory();
    let ks = keyset(&factory);
    let config = PseudoConfig::default()
        .with_rule(PseudoFuncRule::new("fnr", "**/fnr", "fpe"))
        .with_keyset(ks.clone());

    let first = factory.resolve(&config).unwrap();
    let second = factory.resolve(&config.clone()).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(factory.constructions(), 1);

    let other_pattern = PseudoConfig::default()
        .with_rule(PseudoFuncRule::new("fnr", "**/id", "fpe"))
        .with_keyset(ks);
    factory.resolve(&other_pattern).unwrap();
    assert_eq!(factory.constructions(), 2);
}

#[test]
fn test_stateful_function_sets_are_never_cached() {
    let factory = sid_factory();
    let config = PseudoConfig::default()
        .with_rule(PseudoFuncRule::new("fnr", "**/fnr", "map-sid"))
        .with_keyset(keyset(&factory));

    let first = factory.resolve(&config).unwrap();
    let second = factory.resolve(&config).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(factory.constructions(), 2);
}

#[test_case("fpe" ; "ff1")]
#[test_case("ff31" ; "ff31")]
#[test_case("daead" ; "deterministic aead")]
#[test_case("fpe(alphabet=digits)" ; "ff1 digits")]
fn test_round_trip(func: &str) {
    let factory = factory();
    let ks = keyset(&factory);
    let service = PseudoService::new(Arc::new(factory));
    let values = [Some(FNR), Some("Ola Nordmann"), None];

    let pseudonymized = service
        .pseudonymize_field(&field_request(func, Some(ks.clone()), &values))
        .unwrap();
    assert_ne!(pseudonymized.data[0].as_deref(), Some(FNR));
    assert_eq!(pseudonymized.data[2], None);

    let tokens: Vec<Option<&str>> = pseudonymized.data.iter().map(Option::as_deref).collect();
    let restored = service
        .depseudonymize_field(&field_request(func, Some(ks), &tokens))
        .unwrap();
    let expected: Vec<Option<String>> = values.iter().map(|v| v.map(str::to_string)).collect();
    assert_eq!(restored.data, expected);
}

#[test]
fn test_encryption_is_deterministic() {
    let factory = factory();
    let ks = keyset(&factory);
    let service = PseudoService::new(Arc::new(factory));

    let response = service
        .pseudonymize_field(&field_request("daead", Some(ks), &[Some(FNR), Some(FNR)]))
        .unwrap();
    assert_eq!(response.data[0], response.data[1]);
}

#[test]
fn test_scenario_fpe_with_short_value() {
    let factory = factory();
    let ks = keyset(&factory);
    let service = PseudoService::new(Arc::new(factory));

    let response = service
        .pseudonymize_field(&field_request("fpe", Some(ks), &[Some("12345678901"), Some("ab")]))
        .unwrap();

    let token = response.data[0].as_deref().unwrap();
    assert_ne!(token, "12345678901");
    assert_eq!(token.chars().count(), 11);
    assert_eq!(response.data[1].as_deref(), Some("ab"));
    assert_eq!(response.metadata.metric(FieldMetric::FpeLimitation), 1);

    let variables = &response.metadata.datadoc_metadata.pseudo_variables;
    assert_eq!(variables.len(), 1);
    assert_eq!(variables[0].short_name, "fnr");
    assert_eq!(variables[0].data_element_path, "fnr");
    assert_eq!(variables[0].data_element_pattern, "**");
    assert_eq!(variables[0].encryption_algorithm, "FF1_AES256");
}

#[test_case("fpe", Some("ab") ; "return original by default")]
#[test_case("fpe(failureStrategy=RETURN_ORIGINAL)", Some("ab") ; "return original")]
#[test_case("fpe(failureStrategy=SUPPRESS)", None ; "suppress")]
fn test_short_value_policy(func: &str, expected: Option<&str>) {
    let factory = factory();
    let ks = keyset(&factory);
    let service = PseudoService::new(Arc::new(factory));

    let response = service
        .pseudonymize_field(&field_request(func, Some(ks), &[Some("ab")]))
        .unwrap();
    assert_eq!(response.data[0].as_deref(), expected);
    assert_eq!(response.metadata.metric(FieldMetric::FpeLimitation), 1);
    assert!(response.metadata.datadoc_metadata.pseudo_variables.is_empty());
}

#[test]
fn test_metadata_is_deduplicated_over_many_values() {
    let factory = factory();
    let ks = keyset(&factory);
    let service = PseudoService::new(Arc::new(factory));
    let values: Vec<String> = (0..100).map(|i| format!("{:011}", 10_000_000_000u64 + i)).collect();
    let refs: Vec<Option<&str>> = values.iter().map(|v| Some(v.as_str())).collect();
    let request = field_request("fpe", Some(ks), &refs);

    let record = service.pseudonymize_field(&request).unwrap();
    let fast = service.pseudonymize_field_fast(&request, false).unwrap();

    assert_eq!(record.data.len(), 100);
    assert_eq!(record.metadata.datadoc_metadata.pseudo_variables.len(), 1);
    assert_eq!(fast.metadata.datadoc_metadata.pseudo_variables.len(), 1);
}

#[test]
fn test_null_values_are_counted_except_for_sid_mapping() {
    let factory = sid_factory();
    let ks = keyset(&factory);
    let service = PseudoService::new(Arc::new(factory));

    let fpe = service
        .pseudonymize_field(&field_request("fpe", Some(ks.clone()), &[None, None]))
        .unwrap();
    assert_eq!(fpe.data, vec![None, None]);
    assert_eq!(fpe.metadata.metric(FieldMetric::NullValue), 2);

    let sid = service
        .pseudonymize_field(&field_request("map-sid", Some(ks), &[None]))
        .unwrap();
    assert_eq!(sid.data, vec![None]);
    assert_eq!(sid.metadata.metric(FieldMetric::NullValue), 0);
}

#[test]
fn test_repseudonymization_matches_direct_pseudonymization() {
    let factory = factory();
    let source_keyset = keyset(&factory);
    let target_keyset = keyset(&factory);
    let service = PseudoService::new(Arc::new(factory));
    let values = [Some(FNR), Some("ab"), None, Some("Kari Nordmann")];

    let source = service
        .pseudonymize_field(&field_request("fpe", Some(source_keyset.clone()), &values))
        .unwrap();
    let direct = service
        .pseudonymize_field(&field_request("daead", Some(target_keyset.clone()), &values))
        .unwrap();

    let repseudonymized = service
        .repseudonymize_field(&RepseudoFieldRequest {
            name: "fnr".to_string(),
            pattern: None,
            source_pseudo_func: "fpe".to_string(),
            target_pseudo_func: "daead".to_string(),
            source_keyset: Some(source_keyset),
            target_keyset: Some(target_keyset),
            values: source.data.clone(),
        })
        .unwrap();

    assert_eq!(repseudonymized.data, direct.data);
}

#[test]
fn test_batch_and_record_paths_agree() {
    let factory = factory();
    let ks = keyset(&factory);
    let service = PseudoService::new(Arc::new(factory));
    let request = field_request("fpe", Some(ks), &[Some(FNR), Some("ab"), None, Some(FNR)]);

    let record = service.pseudonymize_field(&request).unwrap();
    let fast = service.pseudonymize_field_fast(&request, false).unwrap();

    assert_eq!(record.data, fast.data);
    assert_eq!(
        record.metadata.datadoc_metadata,
        fast.metadata.datadoc_metadata
    );
    assert_eq!(record.metadata.metrics, fast.metadata.metrics);
}

#[test_case("/person/fnr", Some("/person/fnr"), "person.fnr" ; "absolute name and pattern")]
#[test_case("/fnr", None, "fnr" ; "absolute name default pattern")]
#[test_case("person/fnr", Some("person/*"), "person.fnr" ; "relative name")]
fn test_batch_and_record_paths_agree_on_field_paths(name: &str, pattern: Option<&str>, path: &str) {
    let factory = factory();
    let ks = keyset(&factory);
    let service = PseudoService::new(Arc::new(factory));
    let mut request = field_request("daead", Some(ks), &[Some(FNR)]);
    request.name = name.to_string();
    request.pattern = pattern.map(str::to_string);

    let record = service.pseudonymize_field(&request).unwrap();
    let fast = service.pseudonymize_field_fast(&request, false).unwrap();

    assert_ne!(record.data[0].as_deref(), Some(FNR));
    assert_eq!(record.data, fast.data);
    for response in [&record, &fast] {
        let paths: Vec<_> = response
            .metadata
            .datadoc_metadata
            .pseudo_variables
            .iter()
            .map(|v| v.data_element_path.as_str())
            .collect();
        assert_eq!(paths, vec![path]);
    }
}

#[test]
fn test_minimal_metrics_skip_counters() {
    let factory = factory();
    let ks = keyset(&factory);
    let service = PseudoService::new(Arc::new(factory));
    let request = field_request("fpe", Some(ks), &[Some("ab"), None]);

    let response = service.pseudonymize_field_fast(&request, true).unwrap();
    assert_eq!(response.data, vec![Some("ab".to_string()), None]);
    assert!(response.metadata.metrics.is_empty());
}

#[test]
fn test_sid_mapping_end_to_end() {
    let factory = sid_factory();
    let ks = keyset(&factory);
    let service = PseudoService::new(Arc::new(factory));

    let pseudonymized = service
        .pseudonymize_field(&field_request(
            "map-sid(snapshotDate=2023-06-01)",
            Some(ks.clone()),
            &[Some(FNR), Some("01010112345")],
        ))
        .unwrap();

    assert_eq!(pseudonymized.data[1], None);
    assert_eq!(pseudonymized.metadata.metric(FieldMetric::MappedSid), 1);
    assert_eq!(pseudonymized.metadata.metric(FieldMetric::MissingSid), 1);
    let variables = &pseudonymized.metadata.datadoc_metadata.pseudo_variables;
    assert_eq!(variables.len(), 1);
    assert_eq!(variables[0].stable_identifier_version.as_deref(), Some("2023-04-25"));
    assert_eq!(variables[0].stable_identifier_type.as_deref(), Some("FREG_SNR"));

    let token = pseudonymized.data[0].as_deref();
    assert_eq!(token.map(str::len), Some("0001ha3".len()));
    let restored = service
        .depseudonymize_field(&field_request(
            "map-sid(snapshotDate=2023-06-01)",
            Some(ks),
            &[token],
        ))
        .unwrap();
    assert_eq!(restored.data, vec![Some(FNR.to_string())]);
}

#[test]
fn test_sid_lookups() {
    let service = PseudoService::new(Arc::new(sid_factory()));

    let latest = service.lookup_fnr(FNR, None).unwrap();
    assert_eq!(latest.value.as_deref(), Some("0002xy9"));
    assert_eq!(latest.snapshot_date, date("2024-01-01"));

    let older = service.lookup_snr("0001ha3", Some(date("2023-12-31"))).unwrap();
    assert_eq!(older.value.as_deref(), Some(FNR));
}

#[test]
fn test_sid_lookup_without_index() {
    let service = PseudoService::new(Arc::new(factory()));
    assert!(matches!(
        service.lookup_fnr(FNR, None),
        Err(PseudoError::Configuration(_))
    ));
}

#[test]
fn test_layered_records_round_trip() {
    let factory = factory();
    let inner = PseudoConfig::default()
        .with_rule(PseudoFuncRule::new("fnr", "**/fnr", "fpe"))
        .with_keyset(keyset(&factory));
    let outer = PseudoConfig::default()
        .with_rule(PseudoFuncRule::new("fnr", "**/fnr", "daead"))
        .with_keyset(keyset(&factory));
    let service = PseudoService::new(Arc::new(factory));
    let configs = [inner, outer];
    let records = vec![
        json!({"persons": [{"fnr": FNR}, {"fnr": null}]}),
        json!({"persons": []}),
    ];

    let pseudonymized = service.pseudonymize_records(&configs, records.clone()).unwrap();
    assert_ne!(pseudonymized.data[0], records[0]);
    assert_eq!(pseudonymized.data[0]["persons"][1]["fnr"], json!(null));

    let restored = service
        .depseudonymize_records(&configs, pseudonymized.data)
        .unwrap();
    assert_eq!(restored.data, records);
}

#[test]
fn test_configuration_errors_fail_before_processing() {
    let service = PseudoService::new(Arc::new(factory()));

    let unknown = service.pseudonymize_field(&field_request("shuffle", None, &[Some(FNR)]));
    assert!(matches!(unknown, Err(PseudoError::Configuration(_))));

    let no_keyset = service.pseudonymize_field(&field_request("fpe", None, &[Some(FNR)]));
    assert!(matches!(no_keyset, Err(PseudoError::Configuration(_))));

    let no_sid = service.pseudonymize_field(&field_request("map-sid", None, &[Some(FNR)]));
    assert!(matches!(no_sid, Err(PseudoError::Configuration(_))));
}

#[test]
fn test_snapshot_before_sid_index_is_rejected_up_front() {
    let factory = sid_factory();
    let ks = keyset(&factory);
    let service = PseudoService::new(Arc::new(factory));
    // Only values the function never sees
    let request = field_request("map-sid(snapshotDate=2000-01-01)", Some(ks), &[Some("ab"), None]);

    assert!(matches!(
        service.pseudonymize_field(&request),
        Err(PseudoError::Configuration(_))
    ));
    assert!(matches!(
        service.pseudonymize_field_fast(&request, false),
        Err(PseudoError::Configuration(_))
    ));
}

#[test]
fn test_unknown_kek_is_a_key_access_error() {
    let factory = factory();
    let mut ks = keyset(&factory);
    ks.kek_uri = "local-kek://test/other".to_string();
    let service = PseudoService::new(Arc::new(factory));

    let result = service.pseudonymize_field(&field_request("daead", Some(ks), &[Some(FNR)]));
    assert!(matches!(result, Err(PseudoError::KeyAccess(_))));
}
