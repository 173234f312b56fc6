use assert_cmd::Command;
use assert_cmd::cargo;
use businessru::signing::{SecretMaterial, canonical_json};
use mockito::{Matcher, Mock, Server, ServerGuard};
use predicates::prelude::*;
use serde_json::{Value, json};

const APP_ID: &str = "77";
const SECRET: &str = "s3cr3t";

fn signed_body(material: SecretMaterial<'_>, body: Value) -> String {
    let Value::Object(mut map) = body else {
        panic!("body must be an object");
    };
    let signature = material.sign(&canonical_json(&map).unwrap());
    map.insert("app_psw".to_string(), Value::String(signature));
    Value::Object(map).to_string()
}

fn mock_repair(server: &mut ServerGuard, token: &str) -> Mock {
    server
        .mock("GET", "/repair.json")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(signed_body(
            SecretMaterial::Tokenless { secret: SECRET },
            json!({"status": "ok", "token": token}),
        ))
        .create()
}

fn businessru(server: &ServerGuard) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("businessru"));
    cmd.env_remove("BUSINESSRU_MAX_RETRY")
        .env_remove("BUSINESSRU_BASE_URL")
        .env("BUSINESSRU_ACCOUNT", "shop")
        .env("BUSINESSRU_APP_ID", APP_ID)
        .env("BUSINESSRU_SECRET", SECRET)
        .arg("--base-url")
        .arg(server.url());
    cmd
}

#[test]
fn test_end_to_end_get() {
    let mut server = Server::new();
    let repair = mock_repair(&mut server, "t1");

    let query = "app_id=77&ids%5B0%5D=5&ids%5B1%5D=7&limit=10";
    let signature = SecretMaterial::WithToken {
        token: "t1",
        secret: SECRET,
    }
    .sign(query);
    let goods = server
        .mock("GET", "/goods.json")
        .match_query(Matcher::Exact(format!("{}&app_psw={}", query, signature)))
        .with_status(200)
        .with_body(signed_body(
            SecretMaterial::WithToken {
                token: "t1",
                secret: SECRET,
            },
            json!({
                "status": "ok",
                "result": [{"id": "5", "name": "Чайник"}],
                "token": "t2"
            }),
        ))
        .expect(1)
        .create();

    businessru(&server)
        .args(["get", "goods", "-p", "limit=10", "-p", "ids=5", "-p", "ids=7"])
        .assert()
        .success()
        .stdout(predicates::str::contains("\"status\": \"ok\""))
        .stdout(predicates::str::contains("Чайник"))
        .stdout(predicates::str::contains("app_psw").not())
        .stdout(predicates::str::contains("t2").not());

    repair.assert();
    goods.assert();
}

#[test]
fn test_end_to_end_status_error() {
    let mut server = Server::new();
    let _repair = mock_repair(&mut server, "t1");
    let _orders = server
        .mock("POST", "/orders.json")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(signed_body(
            SecretMaterial::WithToken {
                token: "t1",
                secret: SECRET,
            },
            json!({
                "status": "error",
                "error_code": "4",
                "error_text": "partner_id is required",
                "token": "t2"
            }),
        ))
        .create();

    businessru(&server)
        .args(["post", "orders"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("status=error"))
        .stderr(predicates::str::contains("partner_id is required"));
}

#[test]
fn test_end_to_end_endpoint_not_found() {
    let mut server = Server::new();
    let _repair = mock_repair(&mut server, "t1");
    let missing = server
        .mock("GET", "/nothing.json")
        .match_query(Matcher::Any)
        .with_status(405)
        .expect(1)
        .create();

    businessru(&server)
        .args(["get", "nothing"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("405"));

    missing.assert();
}

#[test]
fn test_end_to_end_repair() {
    let mut server = Server::new();
    let repair = mock_repair(&mut server, "t1");

    businessru(&server)
        .arg("repair")
        .assert()
        .success()
        .stdout(predicates::str::is_empty());

    repair.assert();
}

#[test]
fn test_bootstrap_failure_is_reported() {
    let mut server = Server::new();
    let _repair = server
        .mock("GET", "/repair.json")
        .match_query(Matcher::Any)
        .with_status(500)
        .create();

    businessru(&server)
        .args(["get", "goods"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("initial session token"))
        .stderr(predicates::str::contains("returned 500"));
}

#[test]
fn test_missing_credentials() {
    Command::new(cargo::cargo_bin!("businessru"))
        .env_remove("BUSINESSRU_ACCOUNT")
        .env_remove("BUSINESSRU_APP_ID")
        .env_remove("BUSINESSRU_SECRET")
        .args(["get", "goods"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("--account"));
}
