//! Sign-in, status page and sign-out through the HTTP surface.

use da_protocol_saml::bindings::HttpRedirectBinding;
use da_protocol_saml::AuthnRequest;
use reqwest::StatusCode;

use crate::common::{location, TestEnv, ACCESS_GROUP, IDP_LOGIN_URL, LOGOUT_URL, SP_ENTITY_ID};

#[tokio::test]
async fn test_health_endpoints() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    for path in ["/isAlive", "/isReady"] {
        let response = env.client.get(env.url(path)).send().await?;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }

    Ok(())
}

#[tokio::test]
async fn test_anonymous_user_is_sent_to_idp() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env.client.get(env.url("/")).send().await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let target = location(&response).expect("redirect has a Location");
    assert!(target.starts_with(&format!("{IDP_LOGIN_URL}?SAMLRequest=")));

    let decoded = HttpRedirectBinding::decode_url(target)?;
    let request = AuthnRequest::from_xml(&decoded.xml)?;
    assert_eq!(request.issuer, SP_ENTITY_ID);
    assert_eq!(request.destination.as_deref(), Some(IDP_LOGIN_URL));
    assert!(request.id.starts_with('_'));

    Ok(())
}

#[tokio::test]
async fn test_acs_url_is_advertised_when_configured() -> anyhow::Result<()> {
    let env = TestEnv::with_config(|config| {
        config.acs_url = Some("https://device.example/saml/acs".to_string());
    })
    .await?;

    let response = env.client.get(env.url("/")).send().await?;
    let decoded = HttpRedirectBinding::decode_url(location(&response).expect("Location"))?;
    let request = AuthnRequest::from_xml(&decoded.xml)?;
    assert_eq!(
        request.assertion_consumer_service_url.as_deref(),
        Some("https://device.example/saml/acs")
    );

    Ok(())
}

#[tokio::test]
async fn test_member_signs_in_and_sees_access() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env
        .post_acs(
            &env.response()
                .name_id("alice@example.com")
                .groups(["other-group", ACCESS_GROUP]),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));
    let cookie = response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with("device_access_session="));
    assert!(cookie.contains("HttpOnly"));

    let page = env.client.get(env.url("/")).send().await?;
    assert_eq!(page.status(), StatusCode::OK);
    let body = page.text().await?;
    assert!(body.contains("alice@example.com"));
    assert!(body.contains("You are a member of"));
    assert!(body.contains("2 group(s)"));

    Ok(())
}

#[tokio::test]
async fn test_non_member_is_told_so() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let response = env
        .post_acs(&env.response().name_id("bob@example.com").groups(["other-group"]))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let body = env.client.get(env.url("/")).send().await?.text().await?;
    assert!(body.contains("bob@example.com"));
    assert!(body.contains("You are not a member of"));

    Ok(())
}

#[tokio::test]
async fn test_second_login_replaces_the_session() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    env.post_acs(&env.response().name_id("alice@example.com"))
        .await?;
    env.post_acs(&env.response().name_id("carol@example.com").groups([ACCESS_GROUP]))
        .await?;

    let body = env.client.get(env.url("/")).send().await?.text().await?;
    assert!(body.contains("carol@example.com"));
    assert!(!body.contains("alice@example.com"));

    Ok(())
}

#[tokio::test]
async fn test_logout_ends_the_session() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    env.post_acs(&env.response().groups([ACCESS_GROUP])).await?;
    let page = env.client.get(env.url("/")).send().await?;
    assert_eq!(page.status(), StatusCode::OK);

    let response = env.client.get(env.url("/saml/logout")).send().await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some(LOGOUT_URL));

    let page = env.client.get(env.url("/")).send().await?;
    assert_eq!(page.status(), StatusCode::SEE_OTHER);
    assert!(location(&page).is_some_and(|l| l.starts_with(IDP_LOGIN_URL)));

    Ok(())
}

#[tokio::test]
async fn test_session_cookie_is_dead_after_logout() -> anyhow::Result<()> {
    let env = TestEnv::new().await?;

    let login = env.post_acs(&env.response().groups([ACCESS_GROUP])).await?;
    let session_cookie = login
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("login did not set a session cookie"))?;

    env.client.get(env.url("/saml/logout")).send().await?;

    let replayed = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?
        .get(env.url("/"))
        .header(reqwest::header::COOKIE, &session_cookie)
        .send()
        .await?;
    assert_eq!(replayed.status(), StatusCode::SEE_OTHER);
    assert!(location(&replayed).is_some_and(|l| l.starts_with(IDP_LOGIN_URL)));

    Ok(())
}

#[tokio::test]
async fn test_logout_without_session_redirects_home() -> anyhow::Result<()> {
    let env = TestEnv::with_config(|config| config.logout_url = None).await?;

    let response = env.client.get(env.url("/saml/logout")).send().await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));

    Ok(())
}
