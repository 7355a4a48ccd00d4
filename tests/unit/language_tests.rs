use transmark::language_utils::{
    get_language_name, language_codes_match, normalize_to_part2t, resolve_language,
};

#[test]
fn test_getLanguageName_twoLetterCodes() {
    assert_eq!(get_language_name("en").unwrap(), "English");
    assert_eq!(get_language_name("zh").unwrap(), "Chinese");
    assert_eq!(get_language_name("ja").unwrap(), "Japanese");
}

#[test]
fn test_getLanguageName_threeLetterAndNameForms() {
    assert_eq!(get_language_name("eng").unwrap(), "English");
    assert_eq!(get_language_name("english").unwrap(), "English");
    assert_eq!(get_language_name("German").unwrap(), "German");
}

#[test]
fn test_getLanguageName_unknownIdentifier_shouldFail() {
    assert!(get_language_name("xx").is_err());
    assert!(get_language_name("not a language").is_err());
    assert!(get_language_name("").is_err());
}

#[test]
fn test_normalizeToPart2t_twoLetterCode() {
    assert_eq!(normalize_to_part2t("en").unwrap(), "eng");
    assert_eq!(normalize_to_part2t("zh").unwrap(), "zho");
}

#[test]
fn test_normalizeToPart2t_bibliographicCodes_shouldMapToTerminology() {
    // ISO 639-2/B spellings normalize to their 639-2/T counterpart
    assert_eq!(normalize_to_part2t("fre").unwrap(), "fra");
    assert_eq!(normalize_to_part2t("ger").unwrap(), "deu");
    assert_eq!(normalize_to_part2t("chi").unwrap(), "zho");
}

#[test]
fn test_languageCodesMatch_acrossIsoFlavors() {
    assert!(language_codes_match("en", "eng"));
    assert!(language_codes_match("zh", "chi"));
    assert!(language_codes_match("DE", "ger"));
    assert!(!language_codes_match("en", "zh"));
}

#[test]
fn test_languageCodesMatch_invalidIdentifier_shouldNotMatch() {
    assert!(!language_codes_match("en", "nonsense"));
    assert!(!language_codes_match("", ""));
}

#[test]
fn test_resolveLanguage_whitespaceAndCase_shouldBeTolerated() {
    let first = resolve_language(" English ").unwrap();
    let second = resolve_language("EN").unwrap();
    assert_eq!(first, second);
}
