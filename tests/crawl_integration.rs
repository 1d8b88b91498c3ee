//! Integration tests for the catalog crawler against a mock portal.

use std::time::Duration;

use anac_core::crawl::{CrawlSettings, Crawler};
use anac_core::{HttpClient, LinkPatterns};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DIRECT_LINK: &str = "https://dati.anticorruzione.it/opendata/download/dataset/bandi-cig-2024/filesystem/bandi-cig-2024_json.zip";

fn settings(base_url: &str) -> CrawlSettings {
    CrawlSettings {
        base_url: base_url.to_string(),
        max_pages: 10,
        page_attempts: 2,
        retry_delay: Duration::ZERO,
        include_formats: vec!["json".to_string()],
        exclude_formats: vec!["csv".to_string(), "xml".to_string(), "ttl".to_string()],
    }
}

fn crawler(base_url: &str) -> Crawler {
    Crawler::new(
        HttpClient::new().expect("failed to build client"),
        LinkPatterns::default(),
        settings(base_url),
    )
}

async fn mount_page(server: &MockServer, route: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(server)
        .await;
}

async fn mount_catalog(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/opendata/dataset"))
        .and(query_param_is_missing("page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<ul>
                <li><a href="/opendata/dataset/aggiudicazioni">Aggiudicazioni</a></li>
                <li><a href="/opendata/dataset/varianti">Varianti</a></li>
            </ul>
            <a href="/opendata/dataset?page=2">2</a>"#,
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/opendata/dataset"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a href="/opendata/dataset/broken">Broken</a>
            <a href="/opendata/dataset?page=1">1</a>"#,
        ))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_crawl_walks_catalog_and_dataset_pages() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    mount_page(
        &server,
        "/opendata/dataset/aggiudicazioni",
        r#"<a href="/opendata/download/aggiudicazioni/aggiudicazioni_json.zip">Scarica</a>
           <a href="/opendata/download/aggiudicazioni/aggiudicazioni.csv">Download CSV</a>
           <a href="/contatti">Contatti</a>"#,
    )
    .await;
    mount_page(
        &server,
        "/opendata/dataset/varianti",
        r#"<a href="/files/varianti_2023.json">varianti 2023</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/opendata/dataset/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let base = format!("{}/opendata/dataset", server.uri());
    let summary = crawler(&base)
        .crawl(&[], &[])
        .await
        .expect("crawl should run");

    assert_eq!(summary.catalog_pages, 2);
    assert_eq!(
        summary.dataset_pages,
        vec![
            format!("{base}/aggiudicazioni"),
            format!("{base}/varianti"),
            format!("{base}/broken"),
        ]
    );
    assert_eq!(summary.failed_pages, vec![format!("{base}/broken")]);

    let links: Vec<String> = summary.links.iter().cloned().collect();
    assert_eq!(
        links,
        vec![
            format!("{}/files/varianti_2023.json", server.uri()),
            format!(
                "{}/opendata/download/aggiudicazioni/aggiudicazioni_json.zip",
                server.uri()
            ),
        ]
    );
    assert!(summary.direct_links.is_empty());
}

#[tokio::test]
async fn test_known_sources_are_added_to_the_crawl() {
    let server = MockServer::start().await;
    mount_page(&server, "/opendata/dataset", "<p>Nessun dataset</p>").await;
    mount_page(
        &server,
        "/opendata/dataset/smartcig",
        r#"<a href="/opendata/download/dataset/smartcig/filesystem/smartcig_json.zip">JSON</a>"#,
    )
    .await;

    let base = format!("{}/opendata/dataset", server.uri());
    let known_dataset = format!("{base}/smartcig");
    let summary = crawler(&base)
        .crawl(&[known_dataset.clone()], &[DIRECT_LINK.to_string()])
        .await
        .expect("crawl should run");

    assert_eq!(summary.catalog_pages, 1);
    assert_eq!(summary.dataset_pages, vec![known_dataset]);
    assert!(summary.links.contains(DIRECT_LINK));
    assert!(summary.links.contains(&format!(
        "{}/opendata/download/dataset/smartcig/filesystem/smartcig_json.zip",
        server.uri()
    )));
    assert_eq!(summary.direct_links, vec![DIRECT_LINK.to_string()]);
}

#[tokio::test]
async fn test_invalid_base_url_is_rejected() {
    let result = crawler("not a url").crawl(&[], &[]).await;
    assert!(result.is_err());
}
