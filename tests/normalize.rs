use opendata_sync::domain::folder_name;
use opendata_sync::normalize::normalize;

#[test]
fn dash_separator_collapses_to_one_underscore() {
    assert_eq!(normalize("Despesas - Gerais 2024"), "despesas_gerais_2024");
}

#[test]
fn normalize_is_idempotent_on_normalized_input() {
    for input in [
        "Despesas - Gerais 2024",
        "Execução da Despesa ",
        "Órgãos e Entidades",
        "already_normalized",
    ] {
        let once = normalize(input);
        assert_eq!(normalize(&once), once, "input: {input}");
    }
}

#[test]
fn caller_strips_year_before_normalizing() {
    let folder = normalize(folder_name("Despesa Detalhada - 2023"));
    assert_eq!(folder, "despesa_detalhada");
}

#[test]
fn name_without_year_is_kept() {
    let folder = normalize(folder_name("Empenhos por Órgão"));
    assert_eq!(folder, "empenhos_por_orgao");
}

#[test]
fn short_all_digit_name_is_stripped_entirely() {
    assert_eq!(folder_name("24"), "");
    assert_eq!(folder_name("7"), "");
    assert_eq!(folder_name("v24"), "v24");
}

#[test]
fn non_ascii_decimal_year_is_stripped() {
    assert_eq!(folder_name("Despesa ٢٠٢٤"), "Despesa ");
    assert_eq!(normalize(folder_name("Despesa ٢٠٢٤")), "despesa");
}
