use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, Ident, ItemFn, Pat, PathArguments,
    Signature, Type,
};

/// Transform an asynchronous test into a synchronous one, inject dependencies,
/// and ensure that the database is dropped regardless of how the test terminates.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// [`mongodb::Database`], [`crate::model::mongodb::Coll<T>`], and, for
/// `#[backend_test(voter)]`, a [`rocket::http::Header`] carrying the bearer
/// token of the registered example voter.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);
    let login = parse_macro_input!(args as Option<Ident>);

    let as_voter = match &login {
        None => false,
        Some(arg) if arg == "voter" => true,
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `voter` or nothing")
                .into_compile_error()
                .into();
        }
    };

    // Extract type information and reject invalid function signatures.
    let (test_args, collections) = match check_sig(item_fn.sig.clone(), as_voter) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };
    let (collection_idents, collection_types): (Vec<_>, Vec<_>) = collections.into_iter().unzip();

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Register and log in the example voter if needed.
    let maybe_login = if as_voter {
        quote! {
            {
                let response = rocket_client
                    .post(uri!(crate::api::auth::register))
                    .header(rocket::http::ContentType::JSON)
                    .body(rocket::serde::json::json!(crate::model::api::RegisterRequest::example()).to_string())
                    .dispatch()
                    .await;
                assert_eq!(rocket::http::Status::Created, response.status());
            }

            let token = rocket_client
                .post(uri!(crate::api::auth::login))
                .header(rocket::http::ContentType::JSON)
                .body(rocket::serde::json::json!(crate::model::api::LoginRequest::example()).to_string())
                .dispatch()
                .await
                .into_json::<crate::model::api::TokenResponse>()
                .await
                .unwrap()
                .token;
            let auth = rocket::http::Header::new(
                crate::model::auth::AUTHORIZATION,
                format!("Bearer {token}"),
            );
        }
    } else {
        quote! {
            let auth = rocket::http::Header::new(crate::model::auth::AUTHORIZATION, "");
        }
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            // Show the server's own log output alongside test failures.
            log4rs_test_utils::test_logging::init_logging_once_for(
                ["voting_backend"],
                None,
                None,
            );

            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                mongodb::Database,
                rocket::http::Header<'static>,
            ) {
                let db_client = crate::db_client().await;
                let db_name = crate::database();
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_db(db_client.clone(), &db_name).await,
                )
                .await
                .unwrap();
                let db = db_client.database(&db_name);

                #maybe_login

                (rocket_client, db, auth)
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            async fn cleanup(db: mongodb::Database) {
                db.drop(None).await.unwrap();
            }

            // Create an async runtime. We need a separate one for inside and
            // outside the `catch_unwind`.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup.
            let (rocket_client, db, auth) = outer_runtime.block_on(setup());

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let client_mutex = std::sync::Mutex::new(rocket_client);
            let db_mutex = std::sync::Mutex::new(db.clone());
            let auth_mutex = std::sync::Mutex::new(auth);
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                #[allow(unused_variables)]
                let rocket_client = client_mutex.into_inner().unwrap();
                #[allow(unused_variables)]
                let db = db_mutex.into_inner().unwrap();
                #[allow(unused_variables)]
                let auth = auth_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                #(
                    let #collection_idents = crate::model::mongodb::Coll::<#collection_types>::from_db(&db);
                )*

                runtime.block_on(#new_name(#(#test_args),*));
            });

            // Run the cleanup.
            outer_runtime.block_on(cleanup(db));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::panic_any(cause);
            }
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject in order, and
/// reject unknown parameters.
#[allow(clippy::type_complexity)]
fn check_sig(
    sig: Signature,
    as_voter: bool,
) -> Result<(Vec<TokenStream2>, Vec<(Ident, Ident)>), syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_db = false;
    let mut has_auth = false;
    let mut args = vec![];
    let mut collections = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(pat_ident) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    // Valid as the last path segment for any type is itself
                    let last = type_path.path.segments.last().unwrap();
                    if last.ident == "Client" {
                        if has_client {
                            return Err(syn::Error::new(input.span(), "Test cannot accept more than one `rocket::local::asynchronous::Client`"));
                        }
                        has_client = true;
                        args.push(quote! { rocket_client });
                        continue;
                    } else if last.ident == "Database" {
                        if has_db {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `mongodb::Database`",
                            ));
                        }
                        has_db = true;
                        args.push(quote! { db });
                        continue;
                    } else if last.ident == "Header" {
                        if !as_voter {
                            return Err(syn::Error::new(
                                input.span(),
                                "A `Header` is only available with `#[backend_test(voter)]`",
                            ));
                        }
                        if has_auth {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `rocket::http::Header`",
                            ));
                        }
                        has_auth = true;
                        args.push(quote! { auth.clone() });
                        continue;
                    } else if last.ident == "Coll" {
                        if let PathArguments::AngleBracketed(generics) = &last.arguments {
                            if let Some(GenericArgument::Type(Type::Path(type_path))) =
                                generics.args.first()
                            {
                                if let Some(type_ident) = type_path.path.get_ident() {
                                    let ident = pat_ident.ident.clone();
                                    args.push(quote! { #ident });
                                    collections.push((ident, type_ident.clone()));
                                    continue;
                                }
                            }
                        }
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client`, `db_ident: Database`, `auth_ident: Header<'static>` or `collection_ident: Coll<T>`",
        ));
    }

    Ok((args, collections))
}
