#[cfg(test)]
mod harness_tests {
    use merlin_common::error::ErrorKind;
    use merlin_common::schema::Catalog;
    use merlin_planner::{PlannerPhase, MP_UNSUPPORTED_PREFIX};
    use merlin_sql_frontend::load_schema;

    use crate::batch::{BatchDriver, PlanChecker, StatementChecker, StatementOutcome};
    use crate::compiler::{CompiledPlanPair, DualPlanCompiler};
    use crate::differ::diff;
    use crate::error::CheckError;
    use crate::mp_check::{classify_routing, MpConsistencyChecker, RoutingAgreement};
    use crate::normalize::{normalize_columns, strip_node_ids};
    use crate::phase_runner::PhaseRunner;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        load_schema(
            &mut catalog,
            "create table t(a int, b int);\n\
             create table r(x int, y int);\n\
             create table p(id int, a int);\n\
             create table q(id int, v int);\n\
             partition table p on column id;\n\
             partition table q on column id;",
        )
        .unwrap();
        catalog
    }

    fn plan_outcome(sql: &str) -> StatementOutcome {
        let catalog = catalog();
        PlanChecker::new(&catalog).check_statement(sql)
    }

    fn mp_outcome(sql: &str) -> StatementOutcome {
        let catalog = catalog();
        MpConsistencyChecker::new(&catalog).check_statement(sql)
    }

    fn compile_pair(sql: &str) -> CompiledPlanPair {
        let catalog = catalog();
        DualPlanCompiler::new(&catalog).compile(sql).unwrap()
    }

    /// A pair whose sides come from different statements, for driving
    /// the differ into specific disagreements.
    fn mixed_pair(alder_sql: &str, merlin_sql: &str) -> CompiledPlanPair {
        let catalog = catalog();
        let compiler = DualPlanCompiler::new(&catalog);
        let alder = compiler.compile(alder_sql).unwrap().alder;
        let merlin = compiler.compile(merlin_sql).unwrap().merlin;
        CompiledPlanPair {
            statement: merlin_sql.to_string(),
            alder,
            merlin,
        }
    }

    fn report_lines(outcome: StatementOutcome) -> Vec<String> {
        match outcome {
            StatementOutcome::Mismatch(report) => report.lines().to_vec(),
            other => panic!("expected a mismatch, got {:?}", other),
        }
    }

    // ---- normalization ----

    #[test]
    fn test_normalize_rewrites_generated_columns() {
        assert_eq!(
            normalize_columns("($0 + 1) AS EXPR$0, $1 AS EXPR$12"),
            "($0 + 1) AS C1, $1 AS C13"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for text in [
            "SeqScan(table=[t], project=[[($0 + 1) AS EXPR$0, $0 AS a]])",
            "already C1 and C2",
            "EXPR$ with no ordinal",
            "",
        ] {
            let once = normalize_columns(text);
            assert_eq!(normalize_columns(&once), once, "not idempotent for {:?}", text);
        }
    }

    #[test]
    fn test_normalize_touches_nothing_else() {
        assert_eq!(normalize_columns("EXPRESSION EXPR$"), "EXPRESSION EXPR$");
        assert_eq!(
            normalize_columns("Limit(limit=[2], offset=[?1])"),
            "Limit(limit=[2], offset=[?1])"
        );
    }

    #[test]
    fn test_strip_node_ids() {
        assert_eq!(
            strip_node_ids("Limit#1(limit=[5])\n  SeqScan#2(table=[t])"),
            "Limit(limit=[5])\n  SeqScan(table=[t])"
        );
        assert_eq!(strip_node_ids("no ids here"), "no ids here");
    }

    // ---- dual compilation ----

    #[test]
    fn test_matching_plans_stay_silent() {
        for sql in [
            "select a from t where a > ? limit 2 offset ?",
            "select a from t order by b desc",
            "select distinct a from t",
            "select t.a from t join r on t.a = r.x where t.b > 1 and r.y = 2 and t.a < r.y",
            "select t.a from t left join r on t.a = r.x where r.y > 0",
            "select t.a from t left join r on t.a = r.x where r.y is null",
            "select b, count(*) as n from t group by b order by n desc limit 3",
            "select a from p where id = 3",
            "select a from p order by a limit 5",
        ] {
            assert!(
                matches!(plan_outcome(sql), StatementOutcome::Agreed),
                "expected agreement for {}",
                sql
            );
        }
    }

    #[test]
    fn test_generated_column_names_agree_after_normalization() {
        // merlin labels these EXPR$0/EXPR$1, alder C1/C2.
        assert!(matches!(
            plan_outcome("select a + 1, a from t"),
            StatementOutcome::Agreed
        ));
        assert!(matches!(
            plan_outcome("select count(*) from t"),
            StatementOutcome::Agreed
        ));
    }

    #[test]
    fn test_trailing_terminator_is_tolerated() {
        assert!(matches!(
            plan_outcome("select a from t;"),
            StatementOutcome::Agreed
        ));
    }

    #[test]
    fn test_ddl_is_skipped_before_comparison() {
        assert!(matches!(
            plan_outcome("CREATE TABLE T (a INT)"),
            StatementOutcome::Skipped
        ));
        assert!(matches!(
            mp_outcome("CREATE TABLE T (a INT)"),
            StatementOutcome::Skipped
        ));
    }

    #[test]
    fn test_unknown_table_drops_silently() {
        assert!(matches!(
            plan_outcome("select a from missing"),
            StatementOutcome::Skipped
        ));
    }

    #[test]
    fn test_example_schema_round() {
        // The smallest interesting catalog: one table, one column.
        let mut catalog = Catalog::new();
        load_schema(&mut catalog, "create table t(a int)").unwrap();
        let outcome =
            PlanChecker::new(&catalog).check_statement("select a from t where a > ? limit 2 offset ?");
        assert!(matches!(outcome, StatementOutcome::Agreed));
    }

    // ---- the silent downgrade ----

    #[test]
    fn test_silent_downgrade_is_promoted_to_a_report() {
        // alder only recognizes `col = value` pins, so the reversed
        // comparison leaves p distributed and distinct then trips its
        // distributed-unsupported rejection. merlin accepts the
        // reversed pin and plans single-partition.
        let sql = "select distinct a from p where 3 = id";
        let lines = report_lines(plan_outcome(sql));
        assert!(
            lines[0].contains("silent single-partition downgrade"),
            "got {:?}",
            lines
        );
        let lines = report_lines(mp_outcome(sql));
        assert!(lines[0].contains("silent single-partition downgrade"));
    }

    #[test]
    fn test_copartitioned_pin_divergence_is_promoted() {
        // alder refuses every two-partitioned-table join; merlin
        // proves co-partitioning and keeps the pinned join local.
        let sql = "select p.a from p join q on p.id = q.id where p.id = 3";
        let lines = report_lines(plan_outcome(sql));
        assert!(lines[0].contains("silent single-partition downgrade"));
    }

    #[test]
    fn test_both_sides_rejecting_stays_silent() {
        // alder: two partitioned tables; merlin: joined off their
        // partition columns. Nobody plans it, nothing to report.
        let sql = "select p.a from p join q on p.id = q.v";
        assert!(matches!(plan_outcome(sql), StatementOutcome::Skipped));
        assert!(matches!(mp_outcome(sql), StatementOutcome::Skipped));
    }

    #[test]
    fn test_distributed_rejection_counts_as_mp_verdict() {
        // alder refuses the unpinned co-partitioned join as
        // distributed-unsupported; merlin scatters it. For routing
        // purposes that is agreement, not a failure.
        let sql = "select p.a from p join q on p.id = q.id";
        assert!(matches!(mp_outcome(sql), StatementOutcome::Agreed));
        assert!(matches!(plan_outcome(sql), StatementOutcome::Skipped));
    }

    // ---- routing consistency ----

    #[test]
    fn test_routing_disagreement_is_reported() {
        let sql = "select a from p where 3 = id";
        let lines = report_lines(mp_outcome(sql));
        assert!(
            lines[0].contains("routing disagreement"),
            "got {:?}",
            lines
        );
        assert!(lines[0].contains("alder planned multi-partition"));
        assert!(lines[0].contains("merlin planned single-partition"));
    }

    #[test]
    fn test_agreeing_routing_stays_silent() {
        assert!(matches!(mp_outcome("select a from t"), StatementOutcome::Agreed));
        assert!(matches!(mp_outcome("select a from p"), StatementOutcome::Agreed));
        assert!(matches!(
            mp_outcome("select a from p where id = 3"),
            StatementOutcome::Agreed
        ));
    }

    #[test]
    fn test_classify_routing() {
        let sp = compile_pair("select a from t");
        assert_eq!(
            classify_routing(&sp.alder, &sp.merlin),
            RoutingAgreement::BothSinglePartition
        );
        let mp = compile_pair("select a from p");
        assert_eq!(
            classify_routing(&mp.alder, &mp.merlin),
            RoutingAgreement::BothMultiPartition
        );
        assert_eq!(
            classify_routing(&sp.alder, &mp.merlin),
            RoutingAgreement::Disagree
        );
        assert_eq!(RoutingAgreement::Disagree.name(), "DISAGREE");
    }

    // ---- the differ ----

    #[test]
    fn test_diff_silent_on_agreement() {
        let pair = compile_pair("select a from t where a > ? limit 2 offset ?");
        assert!(diff(&pair).is_none());
    }

    #[test]
    fn test_diff_reports_both_full_renderings() {
        let pair = mixed_pair("select a from t", "select b from t");
        let report = diff(&pair).unwrap();
        let lines = report.lines();
        assert!(lines[0].contains("plan trees differ"));
        assert!(lines[0].contains("Expected:\nSeqScan(table=[t], project=[[$0 AS a]])"));
        assert!(lines[0].contains("Actual:\nSeqScan(table=[t], project=[[$1 AS b]])"));
        assert_eq!(lines[1], "scans: [t (SeqScan)] vs [t (SeqScan)]");
        assert_eq!(lines[2], "join nodes: 0 vs 0");
    }

    #[test]
    fn test_two_part_asymmetry_reported_first() {
        let pair = mixed_pair("select a from t", "select a from p");
        let report = diff(&pair).unwrap();
        let lines = report.lines();
        assert!(
            lines[0].contains("two-part plan mismatch"),
            "got {:?}",
            lines
        );
        assert!(lines[0].contains("alder produced a one-part plan"));
        assert!(lines[0].contains("merlin produced a two-part plan"));
        // The root trees still get compared behind it.
        assert!(lines.iter().any(|l| l.contains("plan trees differ")));
    }

    #[test]
    fn test_attributes_checked_when_trees_match() {
        let mut pair = compile_pair("select a from t");
        pair.merlin.attributes.order_deterministic = true;
        let report = diff(&pair).unwrap();
        assert_eq!(report.lines().len(), 1);
        assert!(report.lines()[0].contains("plan attributes differ"));
    }

    #[test]
    fn test_attributes_checked_when_trees_differ() {
        let pair = mixed_pair("select a from t order by a", "select a from t");
        let report = diff(&pair).unwrap();
        let lines = report.lines();
        assert!(lines.iter().any(|l| l.contains("plan trees differ")));
        assert!(lines.iter().any(|l| l.contains("plan attributes differ")));
    }

    // ---- the phase runner ----

    #[test]
    fn test_runner_full_chain_passes() {
        let catalog = catalog();
        let mut runner = PhaseRunner::new(&catalog);
        runner.sql("select a from t where a > ?").pass().unwrap();
    }

    #[test]
    fn test_runner_checks_transform_at_target_phase() {
        let catalog = catalog();
        let mut runner = PhaseRunner::new(&catalog);
        runner
            .sql("select a from t where a > ?")
            .phase(PlannerPhase::Convert)
            .expect_transform(
                "Project(project=[[$0 AS a]])\n  \
                 Filter(condition=[($0 > ?0)])\n    \
                 Scan(table=[t])",
            )
            .pass()
            .unwrap();
    }

    #[test]
    fn test_runner_checks_inlined_plan() {
        let catalog = catalog();
        let mut runner = PhaseRunner::new(&catalog);
        runner
            .sql("select a from t where a > ? limit 2 offset ?")
            .phase(PlannerPhase::Inline)
            .expect_plan(
                "Limit(limit=[2], offset=[?1])\n  \
                 SeqScan(table=[t], filter=[($0 > ?0)], project=[[$0 AS a]])",
            )
            .pass()
            .unwrap();
    }

    #[test]
    fn test_runner_accepts_any_declared_alternative() {
        let catalog = catalog();
        let good = "SeqScan(table=[t], project=[[$0 AS a]])";
        let mut runner = PhaseRunner::new(&catalog);
        runner
            .sql("select a from t")
            .phase(PlannerPhase::Inline)
            .expect_plan("Distinct\n  SeqScan(table=[t])")
            .expect_plan(good)
            .pass()
            .unwrap();
        runner.reset();
        // Order of alternatives does not matter.
        runner
            .sql("select a from t")
            .phase(PlannerPhase::Inline)
            .expect_plan(good)
            .expect_plan("Distinct\n  SeqScan(table=[t])")
            .pass()
            .unwrap();
    }

    #[test]
    fn test_runner_no_match_reports_last_alternative() {
        let catalog = catalog();
        let mut runner = PhaseRunner::new(&catalog);
        let err = runner
            .sql("select a from t")
            .phase(PlannerPhase::Inline)
            .expect_plan("first wrong answer")
            .expect_plan("second wrong answer")
            .pass()
            .unwrap_err();
        match err {
            CheckError::TreeMismatch { expected, actual } => {
                assert_eq!(expected, "second wrong answer");
                assert_eq!(actual, "SeqScan(table=[t], project=[[$0 AS a]])");
            }
            other => panic!("expected a tree mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_runner_json_expectation() {
        let catalog = catalog();
        let mut runner = PhaseRunner::new(&catalog);
        runner
            .sql("select a from t")
            .phase(PlannerPhase::Inline)
            .expect_json(
                "{\"plan\":{\"plan_nodes\":[{\"id\":1,\"node_type\":\"SEQSCAN\",\
                 \"children\":[],\"attributes\":{\"project\":\"$0 AS a\",\"table\":\"t\"}}]},\
                 \"read_only\":true,\"order_deterministic\":false}",
            )
            .pass()
            .unwrap();
    }

    #[test]
    fn test_runner_reset_keeps_statements_isolated() {
        // Node ids and artifacts from the first statement must not
        // leak into the second; the second statement's JSON is the
        // same whether or not another statement ran before it.
        let scan_json = "{\"plan\":{\"plan_nodes\":[{\"id\":1,\"node_type\":\"SEQSCAN\",\
             \"children\":[],\"attributes\":{\"project\":\"$0 AS a\",\"table\":\"t\"}}]},\
             \"read_only\":true,\"order_deterministic\":false}";
        let catalog = catalog();
        let mut runner = PhaseRunner::new(&catalog);
        runner
            .sql("select distinct a from t order by a")
            .phase(PlannerPhase::Inline)
            .pass()
            .unwrap();
        runner.reset();
        runner
            .sql("select a from t")
            .phase(PlannerPhase::Inline)
            .expect_json(scan_json)
            .pass()
            .unwrap();

        let mut fresh = PhaseRunner::new(&catalog);
        fresh
            .sql("select a from t")
            .phase(PlannerPhase::Inline)
            .expect_json(scan_json)
            .pass()
            .unwrap();
    }

    #[test]
    fn test_runner_expected_planning_failure() {
        let catalog = catalog();
        let mut runner = PhaseRunner::new(&catalog);
        runner
            .sql("select p.a from p join q on p.id = q.v")
            .phase(PlannerPhase::MpFallbackCheck)
            .expect_error(ErrorKind::Planning, MP_UNSUPPORTED_PREFIX)
            .fail()
            .unwrap();
    }

    #[test]
    fn test_runner_fail_on_passing_statement() {
        let catalog = catalog();
        let mut runner = PhaseRunner::new(&catalog);
        let err = runner
            .sql("select a from t")
            .phase(PlannerPhase::MpFallbackCheck)
            .fail()
            .unwrap_err();
        match err {
            CheckError::ExpectedExceptionMismatch(msg) => {
                assert!(msg.contains("expected to fail but passed"), "got {}", msg);
            }
            other => panic!("expected an expectation mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_runner_wrong_error_prefix_is_a_mismatch() {
        let catalog = catalog();
        let mut runner = PhaseRunner::new(&catalog);
        let err = runner
            .sql("select p.a from p join q on p.id = q.v")
            .phase(PlannerPhase::MpFallbackCheck)
            .expect_error(ErrorKind::Planning, "some other rejection: ")
            .fail()
            .unwrap_err();
        assert!(matches!(err, CheckError::ExpectedExceptionMismatch(_)));
    }

    #[test]
    fn test_runner_undeclared_failure_is_fatal() {
        let catalog = catalog();
        let mut runner = PhaseRunner::new(&catalog);
        let err = runner
            .sql("select p.a from p join q on p.id = q.v")
            .pass()
            .unwrap_err();
        match err {
            CheckError::UnexpectedException { phase, .. } => {
                assert_eq!(phase, "MP_FALLBACK_CHECK");
            }
            other => panic!("expected an unexpected-exception error, got {:?}", other),
        }
    }

    #[test]
    fn test_runner_parse_failure_matched_by_substring() {
        let catalog = catalog();
        let mut runner = PhaseRunner::new(&catalog);
        runner
            .sql("selec a from t")
            .expect_error_containing("parse error")
            .pass()
            .unwrap();
    }

    #[test]
    fn test_runner_declared_error_must_happen() {
        let catalog = catalog();
        let mut runner = PhaseRunner::new(&catalog);
        let err = runner
            .sql("select a from t")
            .expect_error_containing("parse error")
            .pass()
            .unwrap_err();
        assert!(matches!(err, CheckError::ExpectedExceptionMismatch(_)));
    }

    #[test]
    fn test_runner_commute_chain_variant() {
        let catalog = catalog();
        let mut runner = PhaseRunner::new(&catalog);
        runner
            .sql("select t.a from t join r on t.a = r.x where r.y > 1")
            .phase(PlannerPhase::PhysicalConversionWithJoinCommute)
            .join_commute()
            .pass()
            .unwrap();
    }

    // ---- batch runs ----

    #[test]
    fn test_batch_reports_only_divergence() {
        let input = "\
CREATE TABLE T (a INT);

select a from t;
not even sql
select distinct a from p where 3 = id
select a from t where a > ? limit 2 offset ?
";
        let catalog = catalog();
        let driver = BatchDriver::new(PlanChecker::new(&catalog));
        let mut out = Vec::new();
        let summary = driver.run_lines(input.as_bytes(), &mut out).unwrap();
        assert_eq!(summary.seen, 5);
        assert_eq!(summary.compared, 3);
        assert_eq!(summary.mismatched, 1);
        assert_eq!(summary.skipped, 2);
        assert!(summary.found_divergence());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("select distinct a from p where 3 = id"));
        assert!(text.contains("silent single-partition downgrade"));
        assert!(!text.contains("CREATE TABLE"));
        assert!(!text.contains("not even sql"));
    }

    #[test]
    fn test_batch_clean_run_prints_nothing() {
        let input = "select a from t\nselect a from p where id = 3\n";
        let catalog = catalog();
        let driver = BatchDriver::new(PlanChecker::new(&catalog));
        let mut out = Vec::new();
        let summary = driver.run_lines(input.as_bytes(), &mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(summary.compared, 2);
        assert!(!summary.found_divergence());
    }

    #[test]
    fn test_single_statement_run() {
        let catalog = catalog();
        let driver = BatchDriver::new(PlanChecker::new(&catalog));
        let mut out = Vec::new();
        let summary = driver.run_statement("select a from t", &mut out).unwrap();
        assert_eq!(summary.seen, 1);
        assert_eq!(summary.compared, 1);
        assert!(out.is_empty());
    }

    #[test]
    fn test_batch_routing_checker() {
        let input = "select a from p\nselect a from p where 3 = id\n";
        let catalog = catalog();
        let driver = BatchDriver::new(MpConsistencyChecker::new(&catalog));
        let mut out = Vec::new();
        let summary = driver.run_lines(input.as_bytes(), &mut out).unwrap();
        assert_eq!(summary.mismatched, 1);
        let text = String::from_utf8(out).unwrap();
        // Only the disagreeing statement prints; the first line of the
        // output is its text, not the agreeing statement's.
        assert!(text.starts_with("select a from p where 3 = id\n"));
        assert!(text.contains("routing disagreement"));
    }
}
