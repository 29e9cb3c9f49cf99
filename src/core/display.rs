use crate::core::metadata::{Column, MODULE_MULTI_SITES, MultiSiteMetric, SubReportMeta};
use crate::core::report::{DisplayFormat, ReportParameters};

/// What the hosting channel can rasterize. `graphing_capable` is false
/// when the host has no chart renderer at all; individual sub-reports
/// additionally need a graph representation of their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayCapabilities {
    pub graphing_capable: bool,
}

/// One sub-report with its rendering decisions applied.
#[derive(Debug, Clone)]
pub struct SubReportView {
    pub meta: SubReportMeta,
    pub columns: Vec<Column>,
    pub display_table: bool,
    pub display_graph: bool,
    pub evolution_graph: bool,
}

/// Decide table/graph visibility for every selected sub-report and strip
/// evolution columns from the all-sites summary.
pub fn apply_display_policy(
    selected: Vec<SubReportMeta>,
    parameters: &ReportParameters,
    capabilities: DisplayCapabilities,
    multi_site_metrics: &[MultiSiteMetric],
) -> Vec<SubReportView> {
    selected
        .into_iter()
        .map(|meta| {
            let display_table = displays_table(parameters.display_format);
            let display_graph = displays_graph(
                parameters.display_format,
                meta.is_aggregate(),
                capabilities.graphing_capable,
                meta.graph_url.is_some(),
            );

            let mut columns = meta.columns.clone();
            if meta.module == MODULE_MULTI_SITES {
                columns.retain(|column| {
                    !multi_site_metrics
                        .iter()
                        .any(|m| m.evolution_column == column.key)
                });
            }

            SubReportView {
                meta,
                columns,
                display_table,
                display_graph,
                evolution_graph: parameters.evolution_graph,
            }
        })
        .collect()
}

/// Tables are shown for every format except graphs-only, independent of
/// whether the sub-report aggregates.
pub fn displays_table(format: DisplayFormat) -> bool {
    format != DisplayFormat::GraphsOnly
}

/// Graph visibility per format and aggregate-ness; forced off when the
/// host cannot graph or the sub-report has no graph representation.
pub fn displays_graph(
    format: DisplayFormat,
    is_aggregate: bool,
    graphing_capable: bool,
    graph_url_available: bool,
) -> bool {
    let format_allows = if is_aggregate {
        format == DisplayFormat::GraphsOnly || format == DisplayFormat::TablesAndGraphs
    } else {
        format != DisplayFormat::TablesOnly
    };
    format_allows && graphing_capable && graph_url_available
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::{StaticCatalog, MetadataCatalog, filter_report_metadata, select_ordered};

    #[test]
    fn table_visibility_only_depends_on_the_format() {
        assert!(displays_table(DisplayFormat::GraphsOnlyForKeyMetrics));
        assert!(!displays_table(DisplayFormat::GraphsOnly));
        assert!(displays_table(DisplayFormat::TablesAndGraphs));
        assert!(displays_table(DisplayFormat::TablesOnly));
    }

    #[test]
    fn graph_decision_table_holds_for_every_combination() {
        // (format, aggregate) -> graph allowed, before capability gating
        let expectations = [
            (DisplayFormat::GraphsOnlyForKeyMetrics, true, false),
            (DisplayFormat::GraphsOnlyForKeyMetrics, false, true),
            (DisplayFormat::GraphsOnly, true, true),
            (DisplayFormat::GraphsOnly, false, true),
            (DisplayFormat::TablesAndGraphs, true, true),
            (DisplayFormat::TablesAndGraphs, false, true),
            (DisplayFormat::TablesOnly, true, false),
            (DisplayFormat::TablesOnly, false, false),
        ];

        for (format, aggregate, allowed) in expectations {
            assert_eq!(
                displays_graph(format, aggregate, true, true),
                allowed,
                "format {format:?}, aggregate {aggregate}"
            );

            // absent either capability flag the graph is forced off
            for (capable, has_url) in [(false, true), (true, false), (false, false)] {
                assert!(
                    !displays_graph(format, aggregate, capable, has_url),
                    "format {format:?}, aggregate {aggregate}, capable {capable}, url {has_url}"
                );
            }
        }
    }

    #[tokio::test]
    async fn evolution_flag_is_copied_onto_every_view() {
        let views = multi_site_views(ReportParameters {
            evolution_graph: true,
            ..Default::default()
        })
        .await;
        assert!(views.iter().all(|v| v.evolution_graph));
    }

    #[tokio::test]
    async fn all_sites_summary_loses_evolution_columns_regardless_of_format() {
        for format in DisplayFormat::all() {
            let views = multi_site_views(ReportParameters {
                display_format: format,
                ..Default::default()
            })
            .await;

            let summary = views
                .iter()
                .find(|v| v.meta.unique_id == "MultiSites.getAll")
                .expect("summary present");
            let keys: Vec<&str> = summary.columns.iter().map(|c| c.key.as_str()).collect();
            assert!(!keys.iter().any(|k| k.ends_with("_evolution")), "{format:?}");
            assert!(keys.contains(&"nb_visits"));

            // other modules keep their column set untouched
            let plain = views
                .iter()
                .find(|v| v.meta.unique_id == "VisitsSummary.get")
                .expect("plain sub-report present");
            assert_eq!(plain.columns, plain.meta.columns);
        }
    }

    async fn multi_site_views(parameters: ReportParameters) -> Vec<SubReportView> {
        let catalog = StaticCatalog::load();
        let metas = filter_report_metadata(catalog.sub_reports_for_site(1).await.unwrap());
        let selected = select_ordered(
            &metas,
            &[
                "MultiSites.getAll".to_string(),
                "VisitsSummary.get".to_string(),
            ],
        );
        apply_display_policy(
            selected,
            &parameters,
            DisplayCapabilities {
                graphing_capable: true,
            },
            &catalog.multi_site_metrics(),
        )
    }
}
