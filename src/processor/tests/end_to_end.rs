//! End-to-end refinement scenarios

use super::*;
use crate::config::CastPolicy;
use crate::processor::SnapshotPipeline;
use chrono::NaiveDate;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_latest_partition_with_previous() {
    let temp_dir = TempDir::new().unwrap();
    write_raw_partition(temp_dir.path(), "2024-01-08", &[("OLD3", "Old", "ON", "1", "1,00")]);
    write_raw_partition(temp_dir.path(), "2024-01-10", PETR_VALE);

    let pipeline = SnapshotPipeline::new(test_config(&temp_dir)).unwrap();
    let stats = pipeline.run().await.unwrap();

    assert_eq!(stats.partitions_found, 2);
    assert_eq!(stats.reference_date, Some(date(2024, 1, 10)));
    assert_eq!(stats.previous_date, Some(date(2024, 1, 8)));
    assert_eq!(stats.days_since_previous, 2);
    assert_eq!(stats.rows_read, 2);
    assert_eq!(stats.rows_written, 2);
    assert_eq!(stats.distinct_groups, 2);
    assert_eq!(stats.partitions_written, 2);
    assert_eq!(stats.files_written, 2);

    let root = temp_dir.path().join("refined");
    let files = output_files(&root);
    assert_eq!(
        files,
        vec![
            PathBuf::from("data_referencia=2024-01-10/acao=Petrobras/part-00000.parquet"),
            PathBuf::from("data_referencia=2024-01-10/acao=Vale/part-00000.parquet"),
        ]
    );

    let petrobras = read_output(&root, &files[0]);
    let names: Vec<&str> = petrobras
        .get_column_names()
        .iter()
        .map(|n| n.as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            CODIGO,
            TIPO,
            QUANTIDADE_TEORICA,
            PARTICIPACAO_PERCENTUAL,
            QUANTIDADE_TEORICA_TOTAL,
            QUANTIDADE_TEORICA_ACAO,
            PARTICIPACAO_PERCENTUAL_ACAO,
            DIAS_ULTIMA_DATA_REFERENCIA,
        ]
    );
    for name in [
        QUANTIDADE_TEORICA,
        QUANTIDADE_TEORICA_TOTAL,
        QUANTIDADE_TEORICA_ACAO,
        DIAS_ULTIMA_DATA_REFERENCIA,
    ] {
        assert_eq!(petrobras.column(name).unwrap().dtype(), &DataType::Int64, "{}", name);
    }
    for name in [PARTICIPACAO_PERCENTUAL, PARTICIPACAO_PERCENTUAL_ACAO] {
        assert_eq!(petrobras.column(name).unwrap().dtype(), &DataType::Float64, "{}", name);
    }
    assert_eq!(i64_column(&petrobras, QUANTIDADE_TEORICA), vec![1_000]);
    assert_eq!(i64_column(&petrobras, QUANTIDADE_TEORICA_TOTAL), vec![3_000]);
    assert_eq!(i64_column(&petrobras, QUANTIDADE_TEORICA_ACAO), vec![1_000]);
    assert_eq!(i64_column(&petrobras, DIAS_ULTIMA_DATA_REFERENCIA), vec![2]);

    let vale = read_output(&root, &files[1]);
    assert_eq!(i64_column(&vale, QUANTIDADE_TEORICA), vec![2_000]);
    assert_eq!(i64_column(&vale, QUANTIDADE_TEORICA_TOTAL), vec![3_000]);
    assert_eq!(i64_column(&vale, QUANTIDADE_TEORICA_ACAO), vec![2_000]);
    assert_eq!(i64_column(&vale, DIAS_ULTIMA_DATA_REFERENCIA), vec![2]);

    let pct = vale
        .column(PARTICIPACAO_PERCENTUAL_ACAO)
        .unwrap()
        .f64()
        .unwrap()
        .get(0)
        .unwrap();
    assert!((pct - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_single_partition_has_zero_day_difference() {
    let temp_dir = TempDir::new().unwrap();
    write_raw_partition(temp_dir.path(), "2024-01-10", PETR_VALE);

    let pipeline = SnapshotPipeline::new(test_config(&temp_dir)).unwrap();
    let stats = pipeline.run().await.unwrap();

    assert_eq!(stats.partitions_found, 1);
    assert_eq!(stats.previous_date, None);
    assert_eq!(stats.days_since_previous, 0);

    let root = temp_dir.path().join("refined");
    let files = output_files(&root);
    assert_eq!(files.len(), 2);
    for file in &files {
        let df = read_output(&root, file);
        assert_eq!(i64_column(&df, DIAS_ULTIMA_DATA_REFERENCIA), vec![0]);
        assert_eq!(i64_column(&df, QUANTIDADE_TEORICA_TOTAL), vec![3_000]);
    }
}

#[tokio::test]
async fn test_shared_acao_rows_get_group_sum() {
    let temp_dir = TempDir::new().unwrap();
    write_raw_partition(
        temp_dir.path(),
        "2024-01-10",
        &[
            ("AAAA3", "ON-Group", "ON", "100", "1,00"),
            ("AAAA4", "ON-Group", "PN", "300", "3,00"),
        ],
    );

    let pipeline = SnapshotPipeline::new(test_config(&temp_dir)).unwrap();
    let stats = pipeline.run().await.unwrap();
    assert_eq!(stats.distinct_groups, 1);

    let root = temp_dir.path().join("refined");
    let files = output_files(&root);
    assert_eq!(
        files,
        vec![PathBuf::from(
            "data_referencia=2024-01-10/acao=ON-Group/part-00000.parquet"
        )]
    );

    let df = read_output(&root, &files[0]);
    assert_eq!(df.height(), 2);
    assert_eq!(i64_column(&df, QUANTIDADE_TEORICA_ACAO), vec![400, 400]);
    assert_eq!(i64_column(&df, QUANTIDADE_TEORICA_TOTAL), vec![400, 400]);
}

#[tokio::test]
async fn test_most_recent_partition_is_selected() {
    let temp_dir = TempDir::new().unwrap();
    write_raw_partition(temp_dir.path(), "2024-01-03", &[("OLD3", "Old", "ON", "1", "1,00")]);
    write_raw_partition(temp_dir.path(), "2024-01-10", PETR_VALE);
    write_raw_partition(temp_dir.path(), "2024-01-08", &[("MID3", "Mid", "ON", "1", "1,00")]);

    let pipeline = SnapshotPipeline::new(test_config(&temp_dir)).unwrap();
    let stats = pipeline.run().await.unwrap();

    assert_eq!(stats.reference_date, Some(date(2024, 1, 10)));
    assert_eq!(stats.previous_date, Some(date(2024, 1, 8)));
    assert_eq!(stats.days_since_previous, 2);

    let files = output_files(&temp_dir.path().join("refined"));
    assert!(files
        .iter()
        .all(|f| f.starts_with("data_referencia=2024-01-10")));
}

#[tokio::test]
async fn test_rerun_overwrites_partitions() {
    let temp_dir = TempDir::new().unwrap();
    write_raw_partition(temp_dir.path(), "2024-01-10", PETR_VALE);

    let pipeline = SnapshotPipeline::new(test_config(&temp_dir)).unwrap();
    pipeline.run().await.unwrap();
    let first = output_files(&temp_dir.path().join("refined"));

    pipeline.run().await.unwrap();
    let second = output_files(&temp_dir.path().join("refined"));

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    write_raw_partition(temp_dir.path(), "2024-01-10", PETR_VALE);

    let config = test_config(&temp_dir).with_dry_run();
    let stats = SnapshotPipeline::new(config).unwrap().run().await.unwrap();

    assert!(stats.dry_run);
    assert_eq!(stats.rows_read, 2);
    assert_eq!(stats.rows_written, 0);
    assert_eq!(stats.files_written, 0);
    assert!(!temp_dir.path().join("refined").exists());
}

#[tokio::test]
async fn test_lenient_casts_keep_rows() {
    let temp_dir = TempDir::new().unwrap();
    write_raw_partition(
        temp_dir.path(),
        "2024-01-10",
        &[
            ("PETR4", "Petrobras", "ON", "1.000", "5,00"),
            ("VALE3", "Vale", "ON", "n/d", "10,00"),
        ],
    );

    let config = test_config(&temp_dir).with_cast_policy(CastPolicy::NullOnError);
    let stats = SnapshotPipeline::new(config).unwrap().run().await.unwrap();

    assert_eq!(stats.values_nulled, 1);
    assert_eq!(stats.rows_written, 2);

    let root = temp_dir.path().join("refined");
    let vale = read_output(
        &root,
        Path::new("data_referencia=2024-01-10/acao=Vale/part-00000.parquet"),
    );
    let quantity = vale.column(QUANTIDADE_TEORICA).unwrap().i64().unwrap().get(0);
    assert_eq!(quantity, None);
    // Nulls do not contribute to the sums
    assert_eq!(i64_column(&vale, QUANTIDADE_TEORICA_TOTAL), vec![1_000]);
}

#[tokio::test]
async fn test_partitions_lists_without_processing() {
    let temp_dir = TempDir::new().unwrap();
    write_raw_partition(temp_dir.path(), "2024-01-08", PETR_VALE);
    write_raw_partition(temp_dir.path(), "2024-01-10", PETR_VALE);

    let pipeline = SnapshotPipeline::new(test_config(&temp_dir)).unwrap();
    let partitions = pipeline.partitions().await.unwrap();

    let segments: Vec<&str> = partitions.iter().map(|p| p.segment.as_str()).collect();
    assert_eq!(segments, vec!["ano_mes_dia=2024-01-10", "ano_mes_dia=2024-01-08"]);
    assert!(!temp_dir.path().join("refined").exists());
}
