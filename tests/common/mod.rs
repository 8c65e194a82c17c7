//! Shared fixture for the engine scenario suite: a two-project shop
//! solution held in memory, with unit tests, an interface-dispatch test,
//! an NSubstitute-backed test, and two database-writing tests.

use std::sync::Arc;

use tia::cancel::CancelToken;
use tia::config::Config;
use tia::engine::{Engine, InitMode};
use tia::progress::NullSink;
use tia::workspace::MemoryProvider;

pub const SHOP_SLN: &str = r#"Microsoft Visual Studio Solution File, Format Version 12.00
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Shop.Core", "src\Shop.Core\Shop.Core.csproj", "{1111}"
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Shop.Tests", "tests\Shop.Tests\Shop.Tests.csproj", "{2222}"
EndProject
"#;

pub const TESTS_CSPROJ: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <ItemGroup>
    <PackageReference Include="xunit" Version="2.4.2" />
    <PackageReference Include="NSubstitute" Version="5.0.0" />
  </ItemGroup>
</Project>"#;

const CALCULATOR: &str = r#"namespace Shop.Core
{
    public class Calculator
    {
        public int Add(int a, int b) => a + b;

        public int Sub(int a, int b) => a - b;
    }
}
"#;

const USERS: &str = r#"namespace Shop.Core
{
    public class User
    {
        public User(int id)
        {
            Id = id;
        }

        public int Id { get; set; }
    }

    public interface IUserRepository
    {
        User Load(int id);
    }

    public class UserRepository : IUserRepository
    {
        public User Load(int id)
        {
            return new User(id);
        }
    }
}
"#;

const CONTROLLER: &str = r#"using Shop.Core;

namespace Shop.Api
{
    public class UserController
    {
        private readonly IUserRepository _repo;

        public UserController(IUserRepository repo)
        {
            _repo = repo;
        }

        public User GetUser(int id)
        {
            return _repo.Load(id);
        }
    }
}
"#;

const SHOP_CONTEXT: &str = r#"namespace Shop.Data
{
    public class ShopContext : DbContext
    {
        public DbSet<User> Users { get; set; }
        public DbSet<Order> Orders { get; set; }
    }
}
"#;

const CALCULATOR_TESTS: &str = r#"using Xunit;
using Shop.Core;

namespace Shop.Tests
{
    public class CalculatorTests
    {
        [Fact]
        public void AddsTwo()
        {
            var calc = new Calculator();
            calc.Add(1, 1);
        }

        [Fact]
        public void Subtracts()
        {
            var calc = new Calculator();
            calc.Sub(3, 1);
        }

        [Fact]
        public void ChecksNothing()
        {
        }
    }
}
"#;

const CONTROLLER_TESTS: &str = r#"using Xunit;
using Shop.Api;
using Shop.Core;

namespace Shop.Tests
{
    public class UserControllerTests
    {
        [Fact]
        public void GetsUser()
        {
            var controller = new UserController(new UserRepository());
            controller.GetUser(1);
        }
    }
}
"#;

const MOCK_TESTS: &str = r#"using Xunit;
using NSubstitute;
using Shop.Core;

namespace Shop.Tests
{
    public class MockedRepositoryTests
    {
        [Fact]
        public void LoadsThroughMock()
        {
            var repo = Substitute.For<IUserRepository>();
            repo.Load(1);
        }
    }
}
"#;

const DB_TESTS: &str = r#"using Xunit;
using Shop.Data;

namespace Shop.Tests
{
    public class CustomerDbTests
    {
        [Fact]
        public void WritesUsers()
        {
            var ctx = new ShopContext();
            ctx.SaveChanges();
        }
    }

    public class OrderDbTests
    {
        [Fact]
        public void WritesOrders()
        {
            var ctx = new ShopContext();
            ctx.SaveChanges();
        }
    }
}
"#;

pub fn shop_provider() -> MemoryProvider {
    MemoryProvider::new()
        .with_file("repo/Shop.sln", SHOP_SLN)
        .with_file(
            "repo/src/Shop.Core/Shop.Core.csproj",
            r#"<Project Sdk="Microsoft.NET.Sdk"></Project>"#,
        )
        .with_file("repo/src/Shop.Core/Calculator.cs", CALCULATOR)
        .with_file("repo/src/Shop.Core/Users.cs", USERS)
        .with_file("repo/src/Shop.Core/UserController.cs", CONTROLLER)
        .with_file("repo/src/Shop.Core/ShopContext.cs", SHOP_CONTEXT)
        .with_file("repo/tests/Shop.Tests/Shop.Tests.csproj", TESTS_CSPROJ)
        .with_file("repo/tests/Shop.Tests/CalculatorTests.cs", CALCULATOR_TESTS)
        .with_file("repo/tests/Shop.Tests/UserControllerTests.cs", CONTROLLER_TESTS)
        .with_file("repo/tests/Shop.Tests/MockedRepositoryTests.cs", MOCK_TESTS)
        .with_file("repo/tests/Shop.Tests/DbTests.cs", DB_TESTS)
}

pub fn shop_engine() -> Engine {
    Engine::initialize_with(
        "repo",
        Arc::new(shop_provider()),
        Config::default(),
        InitMode::Bulk,
        &CancelToken::new(),
        &NullSink,
    )
    .expect("fixture workspace initializes")
}

pub fn empty_engine() -> Engine {
    let provider = MemoryProvider::new()
        .with_file("empty/Empty.csproj", r#"<Project Sdk="Microsoft.NET.Sdk"></Project>"#)
        .with_file("empty/Placeholder.cs", "namespace Empty;\n");
    Engine::initialize_with(
        "empty",
        Arc::new(provider),
        Config::default(),
        InitMode::Bulk,
        &CancelToken::new(),
        &NullSink,
    )
    .expect("empty workspace initializes")
}
