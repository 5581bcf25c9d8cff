//! Responses the assertion consumer service must refuse.

use chrono::{Duration, Utc};
use da_protocol_saml::bindings::HttpPostBinding;
use da_test_utils::Signing;
use reqwest::StatusCode;

use crate::common::{location, TestEnv, ACCESS_GROUP};

#[tokio::test]
async fn test_unsigned_response_is_refused() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env
        .post_acs(&env.response().groups([ACCESS_GROUP]).signing(Signing::Unsigned))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(reqwest::header::SET_COOKIE).is_none());

    let body = response.text().await?;
    assert!(body.contains("An error occurred"));
    assert!(!body.contains("not signed"));

    // Still anonymous.
    let page = env.client.get(env.url("/")).send().await?;
    assert_eq!(page.status(), StatusCode::SEE_OTHER);

    Ok(())
}

#[tokio::test]
async fn test_tampered_response_is_refused() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let xml = env
        .response()
        .name_id("mallory@example.com")
        .groups(["other-group"])
        .build()
        .replace("other-group", ACCESS_GROUP);
    let encoded = HttpPostBinding::encode_response(&xml);

    let response = env.post_acs_raw(&encoded).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let page = env.client.get(env.url("/")).send().await?;
    assert_eq!(page.status(), StatusCode::SEE_OTHER);
    assert!(location(&page).is_some());

    Ok(())
}

#[tokio::test]
async fn test_wrong_audience_is_refused() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env
        .post_acs(&env.idp.response_for("urn:another-service"))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_expired_response_is_refused() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env
        .post_acs(&env.response().issued_at(Utc::now() - Duration::hours(2)))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_garbage_payload_is_a_bad_request() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env.post_acs_raw("%%% not base64 %%%").await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = env
        .post_acs_raw(&HttpPostBinding::encode_response("<not-saml/>"))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_debug_mode_shows_the_reason() -> anyhow::Result<()> {
    let env = TestEnv::with_config(|config| config.debug = true).await?;

    let response = env
        .post_acs(&env.response().signing(Signing::Unsigned))
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.text().await?.contains("response is not signed"));

    Ok(())
}
